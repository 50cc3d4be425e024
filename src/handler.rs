//! Functions for driving flowlets to completion.
//!
//! The responder answers each value a body hands out with the input for its
//! next activation, until the body returns.

use std::future::Future;

use crate::error::FlowResult;
use crate::flowlet::Flowlet;
use crate::sans::Sans;
use crate::step::Step;

/// Drive a computation to completion with synchronous responses, starting
/// from `input`.
pub fn drive<C, I, O, R>(mut stage: C, mut input: I, mut responder: R) -> C::Return
where
    C: Sans<I, O>,
    R: FnMut(O) -> I,
{
    loop {
        match stage.next(input) {
            Step::Yielded(output) => {
                input = responder(output);
            }
            Step::Complete(done) => return done,
        }
    }
}

/// Async version of [`drive`]: the responder returns a future producing the
/// next input.
pub async fn drive_async<C, I, O, R, Fut>(mut stage: C, mut input: I, mut responder: R) -> C::Return
where
    C: Sans<I, O>,
    R: FnMut(O) -> Fut,
    Fut: Future<Output = I>,
{
    loop {
        match stage.next(input) {
            Step::Yielded(output) => {
                input = responder(output).await;
            }
            Step::Complete(done) => return done,
        }
    }
}

/// Start `flowlet` and answer everything it hands out until it returns.
///
/// ```rust
/// use flowlet::prelude::*;
///
/// let rt = Runtime::new();
/// let fl = rt.flowlet(
///     |cx: &Cx<u32>, _: Params<u32>| -> FlowResult<Option<u32>> {
///         let mut total = 0;
///         for _ in 0..3 {
///             cx.send(total)?;
///             total += cx.recv()?.unwrap_or(0);
///         }
///         Ok(Some(total))
///     },
///     Params::new(),
/// );
/// let done = handle(&fl, |_| Some(5)).unwrap();
/// assert_eq!(done, Some(15));
/// ```
pub fn handle<V, R>(flowlet: &Flowlet<V>, mut responder: R) -> FlowResult<Option<V>>
where
    V: Clone + Send + 'static,
    R: FnMut(Option<V>) -> Option<V>,
{
    drive(flowlet.clone(), None, |output| responder(output))
}
