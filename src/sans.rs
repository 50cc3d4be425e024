//! Stepwise driving of resumable computations.
//!
//! [`Sans`] is the input-to-step view of anything that can be resumed with a
//! value and either hand something back or finish. A [`Flowlet`] is one: each
//! call to `next` is a raw transfer through the switch engine.

use crate::error::FlowResult;
use crate::flowlet::Flowlet;
use crate::step::Step;

/// A resumable computation fed with `I`, yielding `O` until it completes.
///
/// ```rust
/// use flowlet::prelude::*;
///
/// let rt = Runtime::new();
/// let mut fl = rt.flowlet(pipe(|x: i32| x + 1), Params::new());
/// assert!(matches!(fl.next(None), Step::Yielded(None)));
/// assert!(matches!(fl.next(Some(1)), Step::Yielded(Some(2))));
/// ```
pub trait Sans<I, O> {
    /// Type of final result when the computation completes.
    type Return;

    fn next(&mut self, input: I) -> Step<O, Self::Return>;

    fn boxed(self) -> Box<dyn Sans<I, O, Return = Self::Return>>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

impl<I, O, R> Sans<I, O> for Box<dyn Sans<I, O, Return = R>> {
    type Return = R;

    fn next(&mut self, input: I) -> Step<O, Self::Return> {
        (**self).next(input)
    }
}

/// Failures complete the computation with the error.
impl<V: Clone + Send + 'static> Sans<Option<V>, Option<V>> for Flowlet<V> {
    type Return = FlowResult<Option<V>>;

    fn next(&mut self, input: Option<V>) -> Step<Option<V>, Self::Return> {
        match self.step(input) {
            Ok(step) => step.map_complete(Ok),
            Err(err) => Step::Complete(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use crate::{Cx, Params, Runtime};

    #[test]
    fn test_flowlet_completes_with_return_value() {
        let rt = Runtime::new();
        let mut fl = rt.flowlet(
            |cx: &Cx<u8>, _: Params<u8>| -> FlowResult<Option<u8>> {
                let x = cx.recv()?.unwrap_or(0);
                Ok(Some(x * 3))
            },
            Params::new(),
        );
        assert!(matches!(fl.next(None), Step::Yielded(None)));
        match fl.next(Some(2)) {
            Step::Complete(Ok(value)) => assert_eq!(value, Some(6)),
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn test_dead_flowlet_completes_with_error() {
        let rt = Runtime::new();
        let mut fl = rt
            .flowlet(
                |_cx: &Cx<u8>, _: Params<u8>| -> FlowResult<Option<u8>> { Ok(None) },
                Params::new(),
            )
            .boxed();
        assert!(fl.next(None).is_complete());
        assert!(matches!(fl.next(None), Step::Complete(Err(FlowError::DeadTarget))));
    }
}
