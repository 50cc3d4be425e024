//! Iterating a flowlet's output to natural exhaustion.
//!
//! Each step of the iterator is a consumer [`recv`](Flowlet::recv). When the
//! body delivers nothing the flowlet is finalized and iteration stops; an error
//! is yielded once and the iterator is fused afterwards.
//!
//! ```rust
//! use flowlet::prelude::*;
//!
//! let rt = Runtime::new();
//! let source = rt.flowlet(from_iter(1..=3), Params::new());
//! let mut iter = source.iter();
//! let values: Vec<i32> = iter.by_ref().map(Result::unwrap).collect();
//! assert_eq!(values, vec![1, 2, 3]);
//! assert!(iter.is_exhausted());
//! assert!(source.is_finalized());
//! ```

use crate::error::{FlowError, FlowResult};
use crate::flowlet::Flowlet;

/// Iterator adapter over a [`Flowlet`].
///
/// Both `FlowletIter` and `&mut FlowletIter` implement `Iterator`, so the
/// iterator can be inspected after the loop ends.
pub struct FlowletIter<V: Clone + Send + 'static> {
    flowlet: Flowlet<V>,
    state: IterState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IterState {
    Active,
    Exhausted,
    Failed,
}

impl<V: Clone + Send + 'static> FlowletIter<V> {
    pub fn new(flowlet: Flowlet<V>) -> Self {
        Self {
            flowlet,
            state: IterState::Active,
        }
    }

    /// The body ran dry and the flowlet was finalized.
    pub fn is_exhausted(&self) -> bool {
        self.state == IterState::Exhausted
    }

    /// Iteration stopped on an error.
    pub fn is_failed(&self) -> bool {
        self.state == IterState::Failed
    }

    pub fn flowlet(&self) -> &Flowlet<V> {
        &self.flowlet
    }

    pub fn into_inner(self) -> Flowlet<V> {
        self.flowlet
    }
}

impl<V: Clone + Send + 'static> Iterator for FlowletIter<V> {
    type Item = FlowResult<V>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != IterState::Active {
            return None;
        }
        match self.flowlet.recv() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => {
                self.state = IterState::Exhausted;
                match self.flowlet.finalize() {
                    Ok(()) | Err(FlowError::AlreadyDead) => None,
                    Err(err) => {
                        self.state = IterState::Failed;
                        Some(Err(err))
                    }
                }
            }
            Err(err) => {
                self.state = IterState::Failed;
                Some(Err(err))
            }
        }
    }
}

impl<V: Clone + Send + 'static> Flowlet<V> {
    pub fn iter(&self) -> FlowletIter<V> {
        FlowletIter::new(self.clone())
    }
}

impl<V: Clone + Send + 'static> IntoIterator for Flowlet<V> {
    type Item = FlowResult<V>;
    type IntoIter = FlowletIter<V>;

    fn into_iter(self) -> Self::IntoIter {
        FlowletIter::new(self)
    }
}

impl<V: Clone + Send + 'static> IntoIterator for &Flowlet<V> {
    type Item = FlowResult<V>;
    type IntoIter = FlowletIter<V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
