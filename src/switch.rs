//! The switch engine: every flowlet-level transfer goes through here.
//!
//! A flowlet's first activation always carries its deferred parameters. When
//! that first activation is also meant to deliver a value, the engine makes two
//! transfers: one to run the body up to its first suspension, and one to hand
//! it the caller's value.

use std::sync::Arc;

use either::Either;

use crate::context::{Delivery, Handle, Shared};
use crate::error::FlowError;
use crate::params::Params;

/// Transfer control into the flowlet `target`, carrying `value`.
///
/// `sending` marks a transfer whose value the body is expected to consume.
/// Fails with [`FlowError::DeadTarget`] when `target` already ran and finished.
pub(crate) fn switch<V>(shared: &Arc<Shared<V>>, target: Handle, value: Option<V>, sending: bool) -> Delivery<V>
where
    V: Clone + Send + 'static,
{
    let pending = {
        let mut hub = shared.lock();
        let started = hub.flow(target).started;
        if started && !hub.context(target).is_active() {
            return Err(FlowError::DeadTarget);
        }
        if started {
            None
        } else {
            let flow = hub.flow_mut(target);
            flow.started = true;
            Some(flow.params.clone())
        }
    };

    match pending {
        None => shared.switch_into(target, Either::Right(value)),
        Some(params) if sending => {
            if shared.config.trace_switches {
                tracing::trace!(context = target, "first activation before delivery");
            }
            let first = start(shared, target, params)?;
            if !shared.is_active(target) {
                return Ok(first);
            }
            shared.switch_into(target, Either::Right(value))
        }
        Some(params) => start(shared, target, params),
    }
}

/// First activation. If the context never got going (its thread could not be
/// spawned, say), the flowlet goes back to not started.
fn start<V>(shared: &Arc<Shared<V>>, target: Handle, params: Params<V>) -> Delivery<V>
where
    V: Clone + Send + 'static,
{
    let out = shared.switch_into(target, Either::Left(params));
    if out.is_err() {
        let mut hub = shared.lock();
        if !hub.context(target).is_started() {
            hub.flow_mut(target).started = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::config::RuntimeConfig;
    use crate::cx::Cx;
    use crate::error::{Cancel, FlowResult};

    #[test]
    fn test_first_send_activates_twice() {
        let shared = Arc::new(Shared::new(RuntimeConfig::default()));
        let activations = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&activations);
        let handle = shared.create(
            Box::new(move |cx: &Cx<u32>, _: Params<u32>| -> FlowResult<Option<u32>> {
                seen.fetch_add(1, Ordering::SeqCst);
                let input = cx.recv()?;
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(input.map(|x| x + 1))
            }),
            Params::default(),
        );

        let out = switch(&shared, handle, Some(41), true).unwrap();
        assert_eq!(out, Some(42));
        assert_eq!(activations.load(Ordering::SeqCst), 2);
        assert!(matches!(switch(&shared, handle, None, false), Err(FlowError::DeadTarget)));
    }

    #[test]
    fn test_first_await_activates_once() {
        let shared = Arc::new(Shared::new(RuntimeConfig::default()));
        let handle = shared.create(
            Box::new(|cx: &Cx<u32>, params: Params<u32>| -> FlowResult<Option<u32>> {
                cx.send(params.args[0])?;
                Ok(None)
            }),
            Params::from(vec![7]),
        );

        assert_eq!(switch(&shared, handle, None, false).unwrap(), Some(7));
        assert!(shared.is_active(handle));
        assert_eq!(switch(&shared, handle, None, false).unwrap(), None);
        assert!(!shared.is_active(handle));
    }

    #[derive(Clone)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Everything logged on this thread while a fresh context is started with
    /// a value and another one is destroyed unstarted.
    fn root_events(trace_switches: bool) -> String {
        let out = Capture(Arc::new(Mutex::new(Vec::new())));
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let config = RuntimeConfig {
                trace_switches,
                ..RuntimeConfig::default()
            };
            let shared = Arc::new(Shared::new(config));
            let echo = shared.create(
                Box::new(|cx: &Cx<u32>, _: Params<u32>| -> FlowResult<Option<u32>> { cx.recv() }),
                Params::default(),
            );
            assert_eq!(switch(&shared, echo, Some(1), true).unwrap(), Some(1));
            let unused = shared.create(
                Box::new(|_cx: &Cx<u32>, _: Params<u32>| -> FlowResult<Option<u32>> { Ok(None) }),
                Params::default(),
            );
            let _ = shared.throw_into(unused, Cancel::Unwind);
            shared.teardown();
        });
        let bytes = out.0.lock();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[test]
    fn test_switch_events_follow_config() {
        let quiet = ["spawned context thread", "first activation", "destroyed never activated"];
        let loud = root_events(true);
        assert!(quiet.iter().all(|event| loud.contains(event)), "{loud}");
        let muted = root_events(false);
        assert!(quiet.iter().all(|event| !muted.contains(event)), "{muted}");
        assert!(muted.contains("created context"));
    }

    // a stack larger than the user address space cannot be mapped
    #[cfg(all(target_os = "linux", target_pointer_width = "64"))]
    #[test]
    fn test_failed_spawn_leaves_flowlet_unstarted() {
        let config = RuntimeConfig::default().with_stack_size(1 << 47);
        let shared = Arc::new(Shared::new(config));
        let handle = shared.create(
            Box::new(|_cx: &Cx<u32>, _: Params<u32>| -> FlowResult<Option<u32>> { Ok(Some(1)) }),
            Params::default(),
        );

        for sending in [false, true] {
            assert!(matches!(
                switch(&shared, handle, Some(3), sending),
                Err(FlowError::Spawn(_))
            ));
            let hub = shared.lock();
            assert!(!hub.flow(handle).started);
            assert!(!hub.context(handle).is_started());
            assert!(hub.context(handle).body.is_some());
        }
    }
}
