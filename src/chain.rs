//! Chain linking: return-target rewiring and upstream/downstream binding.
//!
//! Return targets (where a context yields to) and data links (`up`/`down`)
//! are independent. The rolls only touch return targets; `bind` only touches
//! data links.

use crate::context::{Handle, Hub};
use crate::error::{FlowError, FlowResult};
use crate::flowlet::Flowlet;

/// Thread `seq` behind `anchor`: each element returns to the one before it.
pub(crate) fn left_roll<V>(hub: &mut Hub<V>, anchor: Handle, seq: &[Handle]) {
    let mut prev = anchor;
    for &next in seq {
        hub.reflow(prev, next);
        prev = next;
    }
}

/// Thread `seq` in front of `anchor`: each element receives the one before it.
pub(crate) fn right_roll<V>(hub: &mut Hub<V>, anchor: Handle, seq: &[Handle]) {
    let mut prev = anchor;
    for &next in seq {
        hub.reflow(next, prev);
        prev = next;
    }
}

fn reaches<V>(hub: &Hub<V>, from: Handle, target: Handle) -> bool {
    let mut cursor = Some(from);
    for _ in 0..hub.slots.len() {
        match cursor {
            Some(handle) if handle == target => return true,
            Some(handle) => cursor = hub.flow(handle).up,
            None => return false,
        }
    }
    true
}

/// Link `up` as the upstream of `down`.
///
/// Topology is fixed once a flowlet has started, so neither end nor any
/// neighbour that would be unlinked may have run.
pub(crate) fn bind<V>(down: &Flowlet<V>, up: &Flowlet<V>) -> FlowResult<()>
where
    V: Clone + Send + 'static,
{
    if down.shared().id() != up.shared().id() {
        return Err(FlowError::TypeMismatch("cannot bind flowlets from different runtimes"));
    }
    let (me, up) = (down.handle(), up.handle());
    let mut hub = down.shared().lock();

    if hub.flow(me).started {
        return Err(FlowError::TypeMismatch("cannot rebind a started flowlet"));
    }
    if hub.flow(up).started {
        return Err(FlowError::TypeMismatch("cannot bind below a started flowlet"));
    }
    let displaced = [
        hub.flow(me).up.filter(|&old| old != up),
        hub.flow(up).down.filter(|&old| old != me),
    ];
    if displaced.into_iter().flatten().any(|old| hub.flow(old).started) {
        return Err(FlowError::TypeMismatch("cannot unlink a started flowlet"));
    }
    if reaches(&hub, up, me) {
        return Err(FlowError::Cycle);
    }

    if let Some(old_up) = hub.flow(me).up.filter(|&old| old != up) {
        let old = hub.flow_mut(old_up);
        old.down = None;
        old.terminal = true;
    }
    if let Some(old_down) = hub.flow(up).down.filter(|&old| old != me) {
        let old = hub.flow_mut(old_down);
        old.up = None;
        old.initial = true;
    }

    let upstream = hub.flow_mut(up);
    upstream.down = Some(me);
    upstream.terminal = false;

    let flow = hub.flow_mut(me);
    flow.up = Some(up);
    flow.initial = false;
    flow.terminal = flow.down.is_none();

    tracing::debug!(up, down = me, "bind");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowResult;
    use crate::{Cx, Params, Runtime};

    fn relay(cx: &Cx<i32>, _: Params<i32>) -> FlowResult<Option<i32>> {
        while let Some(x) = cx.recv()? {
            cx.send(x)?;
        }
        Ok(None)
    }

    #[test]
    fn test_bind_three_chain_flags() {
        let rt = Runtime::new();
        let (a, b, c) = (
            rt.flowlet(relay, Params::new()),
            rt.flowlet(relay, Params::new()),
            rt.flowlet(relay, Params::new()),
        );
        b.bind(&a).unwrap();
        c.bind(&b).unwrap();

        assert!(a.is_initial() && !a.is_terminal());
        assert!(!b.is_initial() && !b.is_terminal());
        assert!(!c.is_initial() && c.is_terminal());
        assert_eq!(a.down(), Some(b.clone()));
        assert_eq!(b.up(), Some(a.clone()));
        assert_eq!(b.down(), Some(c.clone()));
        assert_eq!(c.up(), Some(b));
        assert_eq!(a.up(), None);
        assert_eq!(c.down(), None);
    }

    #[test]
    fn test_bind_keeps_terminal_when_bound_from_above() {
        let rt = Runtime::new();
        let (a, b, c) = (
            rt.flowlet(relay, Params::new()),
            rt.flowlet(relay, Params::new()),
            rt.flowlet(relay, Params::new()),
        );
        c.bind(&b).unwrap();
        b.bind(&a).unwrap();
        assert!(!b.is_terminal());
        assert!(c.is_terminal());
    }

    #[test]
    fn test_rebind_unlinks_old_neighbours() {
        let rt = Runtime::new();
        let (a, b, c) = (
            rt.flowlet(relay, Params::new()),
            rt.flowlet(relay, Params::new()),
            rt.flowlet(relay, Params::new()),
        );
        c.bind(&a).unwrap();
        c.bind(&b).unwrap();
        assert_eq!(a.down(), None);
        assert!(a.is_terminal());
        assert_eq!(b.down(), Some(c.clone()));

        let d = rt.flowlet(relay, Params::new());
        d.bind(&b).unwrap();
        assert_eq!(c.up(), None);
        assert!(c.is_initial());
    }

    #[test]
    fn test_bind_rejects_cycles() {
        let rt = Runtime::new();
        let (a, b) = (rt.flowlet(relay, Params::new()), rt.flowlet(relay, Params::new()));
        assert!(matches!(a.bind(&a), Err(FlowError::Cycle)));
        b.bind(&a).unwrap();
        assert!(matches!(a.bind(&b), Err(FlowError::Cycle)));
    }

    #[test]
    fn test_bind_rejects_started_and_foreign() {
        let rt = Runtime::new();
        let other = Runtime::new();
        let (a, b) = (rt.flowlet(relay, Params::new()), rt.flowlet(relay, Params::new()));
        let stranger = other.flowlet(relay, Params::new());
        assert!(matches!(a.bind(&stranger), Err(FlowError::TypeMismatch(_))));

        b.recv().unwrap();
        assert!(matches!(b.bind(&a), Err(FlowError::TypeMismatch(_))));
    }

    #[test]
    fn test_bind_leaves_started_chains_alone() {
        let rt = Runtime::new();
        let b = rt.flowlet(
            |cx: &Cx<i32>, _: Params<i32>| -> FlowResult<Option<i32>> {
                loop {
                    cx.send(7)?;
                }
            },
            Params::new(),
        );
        let c = rt.flowlet(relay, Params::new());
        c.bind(&b).unwrap();
        assert_eq!(c.recv().unwrap(), Some(7));

        let d = rt.flowlet(relay, Params::new());
        assert!(matches!(d.bind(&b), Err(FlowError::TypeMismatch(_))));
        assert_eq!(c.up(), Some(b.clone()));
        assert!(!c.is_initial());
        assert_eq!(b.down(), Some(c.clone()));
        assert_eq!(d.up(), None);
        assert_eq!(c.recv().unwrap(), Some(7));

        let e = rt.flowlet(relay, Params::new());
        assert!(matches!(e.bind(&c), Err(FlowError::TypeMismatch(_))));
        assert!(c.is_terminal());
    }

    #[test]
    fn test_rolls_rewire_return_targets() {
        let rt = Runtime::new();
        let fls: Vec<_> = (0..3).map(|_| rt.flowlet(relay, Params::new())).collect();
        let handles: Vec<Handle> = fls.iter().map(Flowlet::handle).collect();
        let shared = fls[0].shared();

        left_roll(&mut shared.lock(), handles[0], &handles[1..]);
        {
            let hub = shared.lock();
            assert_eq!(hub.context(handles[1]).parent, handles[0]);
            assert_eq!(hub.context(handles[2]).parent, handles[1]);
        }

        right_roll(&mut shared.lock(), handles[0], &handles[1..]);
        let hub = shared.lock();
        assert_eq!(hub.context(handles[0]).parent, handles[1]);
        assert_eq!(hub.context(handles[1]).parent, handles[2]);
    }
}
