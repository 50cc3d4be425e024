//! Error taxonomy shared by every flowlet operation.

use std::fmt;
use thiserror::Error;

/// Why a context is being cancelled.
///
/// Cancellation is the only signal ever injected into a suspended context.
/// Callers branch on the reason instead of on the kind of signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cancel {
    /// Chain teardown driven by `finalize`/`close`. Swallowed by the
    /// operation that injected it.
    Unwind,
    /// A standalone flowlet closed itself. Propagates to whoever activated it.
    Exit,
}

impl fmt::Display for Cancel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cancel::Unwind => f.write_str("unwind"),
            Cancel::Exit => f.write_str("exit"),
        }
    }
}

pub type FlowResult<T> = Result<T, FlowError>;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),
    #[error("switch into a finished context")]
    DeadTarget,
    #[error("type mismatch: {0}")]
    TypeMismatch(&'static str),
    #[error("await with no reachable upstream")]
    BlockedUpstream,
    #[error("cancelled ({0})")]
    Cancelled(Cancel),
    #[error("flowlet was already finalized")]
    AlreadyDead,
    #[error("binding would close a cycle in the chain")]
    Cycle,
    #[error("flowlet body panicked: {0}")]
    Panicked(String),
    #[error("failed to spawn context thread")]
    Spawn(#[from] std::io::Error),
    #[error("invalid runtime configuration")]
    Config(#[from] toml::de::Error),
    #[error(transparent)]
    Body(Box<dyn std::error::Error + Send + Sync>),
}

impl FlowError {
    /// Wrap an arbitrary error raised by user code inside a body.
    pub fn body<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        FlowError::Body(err.into())
    }

    /// Returns `true` for any cancellation, whatever its reason.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FlowError::Cancelled(_))
    }

    pub(crate) fn is_unwind(&self) -> bool {
        matches!(self, FlowError::Cancelled(Cancel::Unwind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_reason_in_message() {
        let err = FlowError::Cancelled(Cancel::Exit);
        assert_eq!(err.to_string(), "cancelled (exit)");
        assert!(err.is_cancelled());
        assert!(!err.is_unwind());
        assert!(FlowError::Cancelled(Cancel::Unwind).is_unwind());
    }

    #[test]
    fn test_body_error_is_transparent() {
        let err = FlowError::body("disk on fire");
        assert_eq!(err.to_string(), "disk on fire");
        assert!(!err.is_cancelled());
    }
}
