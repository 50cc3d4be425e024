//! Finalization and in-body close.
//!
//! Teardown always runs upstream first: the doomed run of the chain is
//! rewired to return into the context doing the teardown, then each member is
//! cancelled starting from the far end of the chain.

use std::sync::Arc;

use crate::chain::left_roll;
use crate::context::{Handle, Hub, Shared, Status};
use crate::error::{Cancel, FlowError, FlowResult};

/// `target` followed by the consecutive active upstreams feeding it. Stops at
/// `stop`, at an inactive link, or on a repeat.
fn doomed_run<V>(hub: &Hub<V>, target: Handle, stop: Handle) -> Vec<Handle> {
    let mut run = vec![target];
    let mut cursor = target;
    while let Some(up) = hub.flow(cursor).up {
        if up == stop || run.contains(&up) || !hub.context(up).is_active() {
            break;
        }
        run.push(up);
        cursor = up;
    }
    run
}

pub(crate) fn finalize<V>(shared: &Arc<Shared<V>>, target: Handle) -> FlowResult<()>
where
    V: Clone + Send + 'static,
{
    let current = shared.current();
    let run = {
        let mut hub = shared.lock();
        if target == current {
            return Err(FlowError::ProtocolViolation("a running flowlet cannot finalize itself"));
        }
        if hub.flow(target).finalized {
            return Err(FlowError::AlreadyDead);
        }

        let run = doomed_run(&hub, target, current);
        for &handle in &run {
            let flow = hub.flow_mut(handle);
            flow.finalized = true;
            flow.value = None;
            hub.slots[handle].context.cancel = Some(Cancel::Unwind);
        }
        left_roll(&mut hub, current, &run);
        run
    };
    tracing::debug!(flowlet = target, chain = run.len(), "finalize");

    for &handle in run.iter().rev() {
        let live = matches!(shared.lock().context(handle).status, Status::Suspended | Status::Fresh);
        if !live {
            continue;
        }
        match shared.throw_into(handle, Cancel::Unwind) {
            Ok(_) => {}
            Err(err) if err.is_unwind() => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

pub(crate) fn close<V>(shared: &Arc<Shared<V>>, me: Handle) -> FlowResult<bool>
where
    V: Clone + Send + 'static,
{
    let up = {
        let mut hub = shared.lock();
        let flow = hub.flow(me);
        if flow.suspended {
            return Err(FlowError::ProtocolViolation("a suspended flowlet cannot close"));
        }
        if flow.is_standalone() {
            hub.slots[me].context.cancel = Some(Cancel::Exit);
            tracing::debug!(flowlet = me, "standalone close exits");
            return Err(FlowError::Cancelled(Cancel::Exit));
        }
        let Some(up) = flow.up else {
            return Ok(false);
        };
        if !hub.context(up).is_active() {
            // never activated, or already finished: drop the link only
            hub.flow_mut(me).up = None;
            tracing::debug!(flowlet = me, up, "close drops inactive upstream");
            return Ok(false);
        }
        up
    };

    tracing::debug!(flowlet = me, up, "close");
    let torn_down = finalize(shared, up);
    shared.lock().flow_mut(me).up = None;
    torn_down.map(|()| true)
}
