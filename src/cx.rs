//! In-body API: what a running flowlet can do with its own context.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::{Body, Handle, Shared};
use crate::error::{FlowError, FlowResult};
use crate::flowlet::{Flowlet, Saturation};
use crate::params::Params;
use crate::{switch, terminate};

/// The running flowlet's view of itself, handed to its body.
///
/// `recv` pulls from the upstream (or from the activator when standalone) and
/// `send` pushes to the downstream (or outward when there is none).
pub struct Cx<V> {
    shared: Arc<Shared<V>>,
    me: Handle,
    _local: PhantomData<*const ()>,
}

impl<V: Clone + Send + 'static> Cx<V> {
    pub(crate) fn new(shared: Arc<Shared<V>>, me: Handle) -> Self {
        Self {
            shared,
            me,
            _local: PhantomData,
        }
    }

    /// Wait for the next input value.
    ///
    /// Fails with [`FlowError::BlockedUpstream`] when the flowlet sits in a
    /// chain whose upstream link was cleared by [`close`](Self::close), and
    /// with a cancellation when the flowlet is being torn down.
    pub fn recv(&self) -> FlowResult<Option<V>> {
        let (standalone, up) = {
            let mut hub = self.shared.lock();
            let flow = hub.flow_mut(self.me);
            flow.saturation = Saturation::AwaitingInput;
            (flow.is_standalone(), flow.up)
        };
        if standalone {
            return self.shared.switch_up(None);
        }
        match up {
            Some(up) => switch::switch(&self.shared, up, None, false),
            None => Err(FlowError::BlockedUpstream),
        }
    }

    /// Emit `value` downstream, or to the activator when there is no
    /// downstream. Returns once this flowlet is resumed.
    pub fn send(&self, value: V) -> FlowResult<()> {
        let down = {
            let mut hub = self.shared.lock();
            let flow = hub.flow_mut(self.me);
            flow.saturation = Saturation::Producing;
            flow.down
        };
        match down {
            Some(down) => switch::switch(&self.shared, down, Some(value), true).map(drop),
            None => self.shared.switch_up(Some(value)).map(drop),
        }
    }

    /// Park until the consumer calls [`Flowlet::resume`].
    pub fn suspend(&self) -> FlowResult<()> {
        self.shared.lock().flow_mut(self.me).suspended = true;
        tracing::debug!(flowlet = self.me, "suspend");
        self.shared.switch_up(None).map(drop)
    }

    /// Close the upstream side of this flowlet.
    ///
    /// Returns `Ok(true)` when an active upstream was torn down and `Ok(false)`
    /// when there was nothing to tear down. A standalone flowlet cannot close
    /// anything and instead exits: the call fails with
    /// [`Cancel::Exit`](crate::Cancel::Exit), which the body should propagate.
    /// That path never returns `Ok(false)`; afterwards the flowlet is dead.
    pub fn close(&self) -> FlowResult<bool> {
        terminate::close(&self.shared, self.me)
    }

    /// Handle to the flowlet running this body.
    pub fn current(&self) -> Flowlet<V> {
        Flowlet::from_parts(Arc::clone(&self.shared), self.me)
    }

    /// Create a nested flowlet whose results come back to this body.
    pub fn flowlet<B: Body<V>>(&self, body: B, params: Params<V>) -> Flowlet<V> {
        let id = self.shared.create(Box::new(body), params);
        Flowlet::from_parts(Arc::clone(&self.shared), id)
    }

    /// Deferred parameters this body was constructed with.
    pub fn params(&self) -> Params<V> {
        self.shared.lock().flow(self.me).params.clone()
    }

    pub fn has_upstream(&self) -> bool {
        self.shared.lock().flow(self.me).up.is_some()
    }

    pub fn is_standalone(&self) -> bool {
        self.shared.lock().flow(self.me).is_standalone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{Cancel, Runtime};

    #[test]
    fn test_suspend_and_resume_preserve_state() {
        let rt = Runtime::new();
        let fl = rt.flowlet(
            |cx: &Cx<u32>, _: Params<u32>| -> FlowResult<Option<u32>> {
                let mut total = 0;
                for step in 1..=3 {
                    total += step;
                    cx.suspend()?;
                }
                Ok(Some(total))
            },
            Params::new(),
        );

        assert_eq!(fl.switch(None).unwrap(), None);
        assert!(fl.is_suspended());
        assert!(matches!(fl.recv(), Err(FlowError::ProtocolViolation(_))));
        assert!(matches!(fl.send(1), Err(FlowError::ProtocolViolation(_))));
        assert_eq!(fl.resume().unwrap(), None);
        assert_eq!(fl.resume().unwrap(), None);
        assert_eq!(fl.resume().unwrap(), Some(6));
        assert!(!fl.is_suspended());
        assert!(fl.is_dead());
    }

    #[test]
    fn test_standalone_close_exits() {
        let rt = Runtime::new();
        let fl = rt.flowlet(
            |cx: &Cx<u32>, _: Params<u32>| -> FlowResult<Option<u32>> {
                cx.send(1)?;
                let closed = cx.close();
                assert!(matches!(closed, Err(FlowError::Cancelled(Cancel::Exit))));
                cx.send(2)?;
                Ok(Some(3))
            },
            Params::new(),
        );

        assert_eq!(fl.recv().unwrap(), Some(1));
        assert!(matches!(fl.recv(), Err(FlowError::Cancelled(Cancel::Exit))));
        assert!(fl.is_dead());
        assert!(matches!(fl.switch(None), Err(FlowError::DeadTarget)));
    }

    #[test]
    fn test_close_without_upstream_is_noop() {
        let rt = Runtime::new();
        let down = rt.flowlet(
            |cx: &Cx<u32>, _: Params<u32>| -> FlowResult<Option<u32>> {
                let first = cx.close()?;
                let second = cx.close()?;
                Ok(Some(u32::from(first) * 10 + u32::from(second)))
            },
            Params::new(),
        );
        let up = rt.flowlet(
            |cx: &Cx<u32>, _: Params<u32>| -> FlowResult<Option<u32>> {
                cx.send(5)?;
                Ok(None)
            },
            Params::new(),
        );
        down.bind(&up).unwrap();

        // upstream never ran, so there is nothing to tear down
        assert_eq!(down.switch(None).unwrap(), Some(0));
        assert!(down.up().is_none());
    }

    #[test]
    fn test_nested_flowlet_returns_to_creator() {
        let rt = Runtime::new();
        let outer = rt.flowlet(
            |cx: &Cx<u32>, _: Params<u32>| -> FlowResult<Option<u32>> {
                let inner = cx.flowlet(
                    |inner: &Cx<u32>, params: Params<u32>| -> FlowResult<Option<u32>> {
                        inner.send(params.args[0] + 1)?;
                        Ok(None)
                    },
                    Params::from(vec![9]),
                );
                let got = inner.recv()?;
                Ok(got)
            },
            Params::new(),
        );
        assert_eq!(outer.switch(None).unwrap(), Some(10));
    }

    #[test]
    fn test_current_names_running_flowlet() {
        let calls = Arc::new(AtomicUsize::new(usize::MAX));
        let seen = Arc::clone(&calls);
        let rt = Runtime::new();
        let fl = rt.flowlet(
            move |cx: &Cx<u32>, _: Params<u32>| -> FlowResult<Option<u32>> {
                seen.store(cx.current().id(), Ordering::SeqCst);
                assert_eq!(crate::current::<u32>(), Some(cx.current()));
                assert!(crate::current::<String>().is_none());
                Ok(None)
            },
            Params::new(),
        );
        fl.switch(None).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), fl.id());
        assert!(rt.current().is_none());
    }
}
