//! The runtime: owner of every context and entry point for building flowlets.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::chain;
use crate::config::RuntimeConfig;
use crate::context::{Body, Handle, ROOT, Shared};
use crate::error::{FlowError, FlowResult};
use crate::flowlet::Flowlet;
use crate::params::Params;

/// Owns the contexts of a family of flowlets exchanging values of type `V`.
///
/// The thread that creates the runtime is its root context. Dropping the
/// runtime cancels every context still alive, newest first, and joins their
/// threads.
///
/// ```rust
/// use flowlet::{Cx, FlowResult, Params, Runtime};
///
/// let rt = Runtime::new();
/// let squares = rt.flowlet(
///     |cx: &Cx<u64>, params: Params<u64>| -> FlowResult<Option<u64>> {
///         for n in 1..=params.args[0] {
///             cx.send(n * n)?;
///         }
///         Ok(None)
///     },
///     Params::new().arg(3),
/// );
/// let all: Vec<u64> = squares.iter().collect::<FlowResult<_>>().unwrap();
/// assert_eq!(all, vec![1, 4, 9]);
/// ```
pub struct Runtime<V: Clone + Send + 'static> {
    shared: Arc<Shared<V>>,
    _local: PhantomData<*const ()>,
}

impl<V: Clone + Send + 'static> Default for Runtime<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + 'static> fmt::Debug for Runtime<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.shared.id())
            .field("config", &self.shared.config)
            .finish()
    }
}

impl<V: Clone + Send + 'static> Runtime<V> {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let shared = Arc::new(Shared::new(config));
        tracing::debug!(runtime = shared.id(), "runtime created");
        Self {
            shared,
            _local: PhantomData,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }

    /// Create a flowlet. The body does not run until the first transfer into
    /// it, at which point it receives `params`.
    pub fn flowlet<B: Body<V>>(&self, body: B, params: Params<V>) -> Flowlet<V> {
        let id = self.shared.create(Box::new(body), params);
        Flowlet::from_parts(Arc::clone(&self.shared), id)
    }

    /// The flowlet running on the calling thread, if it belongs to this runtime.
    pub fn current(&self) -> Option<Flowlet<V>> {
        match self.shared.current() {
            ROOT => None,
            id => Some(Flowlet::from_parts(Arc::clone(&self.shared), id)),
        }
    }

    /// Make `b` yield and return into `a`.
    pub fn reflow(&self, a: &Flowlet<V>, b: &Flowlet<V>) -> FlowResult<()> {
        let (a, b) = (self.own(a)?, self.own(b)?);
        self.shared.lock().reflow(a, b);
        Ok(())
    }

    /// Rewire return targets so each of `seq` returns into its predecessor,
    /// the first one into `anchor`.
    pub fn left_roll(&self, anchor: &Flowlet<V>, seq: &[Flowlet<V>]) -> FlowResult<()> {
        let anchor = self.own(anchor)?;
        let seq = self.own_all(seq)?;
        chain::left_roll(&mut self.shared.lock(), anchor, &seq);
        Ok(())
    }

    /// Rewire return targets so each predecessor returns into the next of
    /// `seq`, starting with `anchor` returning into `seq[0]`.
    pub fn right_roll(&self, anchor: &Flowlet<V>, seq: &[Flowlet<V>]) -> FlowResult<()> {
        let anchor = self.own(anchor)?;
        let seq = self.own_all(seq)?;
        chain::right_roll(&mut self.shared.lock(), anchor, &seq);
        Ok(())
    }

    /// Number of contexts that have been activated and not yet finished.
    pub fn live_contexts(&self) -> usize {
        let hub = self.shared.lock();
        hub.slots
            .iter()
            .skip(1)
            .filter(|slot| slot.context.is_active())
            .count()
    }

    fn own(&self, flowlet: &Flowlet<V>) -> FlowResult<Handle> {
        if flowlet.shared().id() == self.shared.id() {
            Ok(flowlet.handle())
        } else {
            Err(FlowError::TypeMismatch("flowlet belongs to another runtime"))
        }
    }

    fn own_all(&self, seq: &[Flowlet<V>]) -> FlowResult<Vec<Handle>> {
        seq.iter().map(|flowlet| self.own(flowlet)).collect()
    }
}

impl<V: Clone + Send + 'static> Drop for Runtime<V> {
    fn drop(&mut self) {
        tracing::debug!(runtime = self.shared.id(), "runtime dropped");
        self.shared.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::Cx;

    fn echo(cx: &Cx<u8>, _: Params<u8>) -> FlowResult<Option<u8>> {
        while let Some(x) = cx.recv()? {
            cx.send(x)?;
        }
        Ok(None)
    }

    #[test]
    fn test_drop_cancels_live_contexts() {
        crate::init_tracing();
        let unwound = Arc::new(AtomicUsize::new(0));
        {
            let rt = Runtime::new();
            for _ in 0..3 {
                let seen = Arc::clone(&unwound);
                let fl = rt.flowlet(
                    move |cx: &Cx<u8>, _: Params<u8>| -> FlowResult<Option<u8>> {
                        let out = cx.recv();
                        if matches!(out, Err(FlowError::Cancelled(_))) {
                            seen.fetch_add(1, Ordering::SeqCst);
                        }
                        out
                    },
                    Params::new(),
                );
                assert_eq!(fl.recv().unwrap(), None);
            }
            rt.flowlet(echo, Params::new());
            assert_eq!(rt.live_contexts(), 3);
        }
        assert_eq!(unwound.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_reflow_redirects_outward_yields() {
        let rt = Runtime::new();
        let inner = rt.flowlet(echo, Params::new());
        let handle = inner.clone();
        let outer = rt.flowlet(
            move |cx: &Cx<u8>, _: Params<u8>| -> FlowResult<Option<u8>> {
                // inner yields here instead of at the root once reflowed
                let got = handle.switch(None)?;
                cx.send(got.unwrap_or(0) + 1)?;
                Ok(None)
            },
            Params::new(),
        );
        rt.reflow(&outer, &inner).unwrap();
        assert_eq!(outer.switch(None).unwrap(), Some(1));
    }

    #[test]
    fn test_foreign_flowlets_are_rejected() {
        let rt = Runtime::new();
        let other = Runtime::new();
        let ours = rt.flowlet(echo, Params::new());
        let theirs = other.flowlet(echo, Params::new());
        assert!(matches!(rt.reflow(&ours, &theirs), Err(FlowError::TypeMismatch(_))));
        assert!(matches!(
            rt.left_roll(&ours, std::slice::from_ref(&theirs)),
            Err(FlowError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_thread_name_comes_from_config() {
        let rt = Runtime::with_config(RuntimeConfig::default().with_thread_name("stage"));
        let fl = rt.flowlet(
            |cx: &Cx<u8>, _: Params<u8>| -> FlowResult<Option<u8>> {
                let name = std::thread::current().name().map(str::to_owned);
                let expected = format!("stage-{}", cx.current().id());
                Ok(Some(u8::from(name.as_deref() == Some(expected.as_str()))))
            },
            Params::new(),
        );
        assert_eq!(fl.switch(None).unwrap(), Some(1));
    }
}
