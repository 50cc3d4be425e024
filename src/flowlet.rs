//! Consumer-side flowlet handles.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use either::Either;

use crate::context::{Handle, Shared};
use crate::error::{FlowError, FlowResult};
use crate::params::Params;
use crate::step::Step;
use crate::{chain, switch, terminate};

/// Direction of the last data-flow operation a body performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Saturation {
    /// The body has not sent or awaited yet.
    NotStarted,
    /// The body last sent a value downstream or outward.
    Producing,
    /// The body last asked for a value.
    AwaitingInput,
}

/// Flowlet bookkeeping stored next to its context.
///
/// `initial` holds exactly when `up` is empty and `terminal` exactly when
/// `down` is empty. A buffered value is pending exactly when `value` is set.
#[derive(Debug, Clone)]
pub(crate) struct FlowState<V> {
    pub(crate) params: Params<V>,
    pub(crate) value: Option<V>,
    pub(crate) saturation: Saturation,
    pub(crate) started: bool,
    pub(crate) suspended: bool,
    pub(crate) finalized: bool,
    pub(crate) initial: bool,
    pub(crate) terminal: bool,
    pub(crate) up: Option<Handle>,
    pub(crate) down: Option<Handle>,
}

impl<V> FlowState<V> {
    pub(crate) fn new(params: Params<V>) -> Self {
        Self {
            params,
            value: None,
            saturation: Saturation::NotStarted,
            started: false,
            suspended: false,
            finalized: false,
            initial: true,
            terminal: true,
            up: None,
            down: None,
        }
    }

    /// Neither bound to an upstream nor feeding a downstream.
    pub(crate) fn is_standalone(&self) -> bool {
        self.initial && self.terminal
    }
}

/// Handle to a cooperative context with chain links and two-way data flow.
///
/// Handles are cheap to clone and compare equal when they name the same
/// context. They may be moved into other bodies of the same runtime; a
/// transfer attempted from a thread foreign to the runtime is rejected.
pub struct Flowlet<V> {
    shared: Arc<Shared<V>>,
    id: Handle,
}

impl<V> Clone for Flowlet<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            id: self.id,
        }
    }
}

impl<V> PartialEq for Flowlet<V> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared) && self.id == other.id
    }
}

impl<V> Eq for Flowlet<V> {}

impl<V> fmt::Debug for Flowlet<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flowlet").field("id", &self.id).finish()
    }
}

impl<V: Clone + Send + 'static> Flowlet<V> {
    pub(crate) fn from_parts(shared: Arc<Shared<V>>, id: Handle) -> Self {
        Self { shared, id }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared<V>> {
        &self.shared
    }

    pub(crate) fn handle(&self) -> Handle {
        self.id
    }

    fn wrap(&self, handle: Option<Handle>) -> Option<Flowlet<V>> {
        handle.map(|id| Flowlet::from_parts(Arc::clone(&self.shared), id))
    }

    fn read<R>(&self, f: impl FnOnce(&FlowState<V>) -> R) -> R {
        f(self.shared.lock().flow(self.id))
    }

    /// Deliver `value` into the body.
    ///
    /// Whatever the body emits before it next suspends is buffered and
    /// returned by the following [`recv`](Self::recv) without re-entering it.
    pub fn send(&self, value: V) -> FlowResult<()> {
        {
            let hub = self.shared.lock();
            let flow = hub.flow(self.id);
            if flow.suspended {
                return Err(FlowError::ProtocolViolation("cannot send to a suspended flowlet"));
            }
            if flow.saturation == Saturation::Producing {
                return Err(FlowError::ProtocolViolation("flowlet already holds output; recv it first"));
            }
        }

        let out = switch::switch(&self.shared, self.id, Some(value), true)?;
        if let Some(out) = out {
            self.shared.lock().flow_mut(self.id).value = Some(out);
        }
        Ok(())
    }

    /// Take the next value the body emits.
    ///
    /// Returns a buffered value without switching when one is pending. The
    /// body's return value comes back here once it finishes.
    pub fn recv(&self) -> FlowResult<Option<V>> {
        {
            let mut hub = self.shared.lock();
            let flow = hub.flow_mut(self.id);
            if flow.suspended {
                return Err(FlowError::ProtocolViolation("cannot recv from a suspended flowlet"));
            }
            if flow.started && flow.saturation != Saturation::Producing {
                return Err(FlowError::ProtocolViolation("flowlet has produced nothing to recv"));
            }
            if let Some(value) = flow.value.take() {
                return Ok(Some(value));
            }
        }
        switch::switch(&self.shared, self.id, None, false)
    }

    /// Raw transfer through the switch engine with no protocol checks. A
    /// present value counts as a send.
    pub fn switch(&self, value: Option<V>) -> FlowResult<Option<V>> {
        let sending = value.is_some();
        switch::switch(&self.shared, self.id, value, sending)
    }

    /// Drive one activation and report whether the body is still alive.
    pub fn step(&self, input: Option<V>) -> FlowResult<Step<Option<V>, Option<V>>> {
        let out = self.switch(input)?;
        Ok(if self.is_active() {
            Step::Yielded(out)
        } else {
            Step::Complete(out)
        })
    }

    /// Wake a flowlet that parked itself with [`Cx::suspend`](crate::Cx::suspend).
    pub fn resume(&self) -> FlowResult<Option<V>> {
        {
            let mut hub = self.shared.lock();
            let flow = hub.flow_mut(self.id);
            if !flow.suspended {
                return Err(FlowError::ProtocolViolation("flowlet is not suspended"));
            }
            flow.suspended = false;
        }
        tracing::debug!(flowlet = self.id, "resume");
        self.shared.switch_into(self.id, Either::Right(None))
    }

    /// Make `up` this flowlet's upstream.
    ///
    /// Fails if this flowlet already started, if `up` belongs to a different
    /// runtime, or if the link would close a cycle.
    pub fn bind(&self, up: &Flowlet<V>) -> FlowResult<()> {
        chain::bind(self, up)
    }

    /// Tear this flowlet down together with the active run of upstreams
    /// feeding it, upstream first.
    pub fn finalize(&self) -> FlowResult<()> {
        terminate::finalize(&self.shared, self.id)
    }

    /// A clone of the buffered value, if any.
    pub fn value(&self) -> Option<V> {
        self.read(|flow| flow.value.clone())
    }

    pub fn params(&self) -> Params<V> {
        self.read(|flow| flow.params.clone())
    }

    pub fn args(&self) -> Vec<V> {
        self.read(|flow| flow.params.args.clone())
    }

    pub fn kwargs(&self) -> BTreeMap<String, V> {
        self.read(|flow| flow.params.kwargs.clone())
    }

    /// Activated at least once and not yet finished.
    pub fn is_active(&self) -> bool {
        let hub = self.shared.lock();
        hub.flow(self.id).started && hub.context(self.id).is_active()
    }

    /// The body has run and finished, or the context was destroyed.
    pub fn is_dead(&self) -> bool {
        let hub = self.shared.lock();
        hub.context(self.id).is_started() && !hub.context(self.id).is_active()
    }

    pub fn up(&self) -> Option<Flowlet<V>> {
        self.wrap(self.read(|flow| flow.up))
    }

    pub fn down(&self) -> Option<Flowlet<V>> {
        self.wrap(self.read(|flow| flow.down))
    }

    pub fn saturation(&self) -> Saturation {
        self.read(|flow| flow.saturation)
    }

    pub fn is_initial(&self) -> bool {
        self.read(|flow| flow.initial)
    }

    pub fn is_terminal(&self) -> bool {
        self.read(|flow| flow.terminal)
    }

    pub fn is_pending(&self) -> bool {
        self.read(|flow| flow.value.is_some())
    }

    pub fn is_started(&self) -> bool {
        self.read(|flow| flow.started)
    }

    pub fn is_suspended(&self) -> bool {
        self.read(|flow| flow.suspended)
    }

    pub fn is_finalized(&self) -> bool {
        self.read(|flow| flow.finalized)
    }

    /// Arena index of this flowlet within its runtime.
    pub fn id(&self) -> usize {
        self.id
    }
}
