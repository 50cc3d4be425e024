//! Cooperative execution contexts.
//!
//! Every activated flowlet owns one OS thread, but only one thread ever holds
//! the turn. A switch hands the turn to the target and parks the caller until
//! some other context hands it back. All bookkeeping lives in one arena guarded
//! by a single mutex; the condvar is only used to wake parked contexts.
//!
//! Return targets follow the classic greenlet rules: a context remembers the
//! context that created it (`parent`), and when its body returns the result is
//! delivered to the first live context along that parent chain.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle, ThreadId};

use either::Either;
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::config::RuntimeConfig;
use crate::cx::Cx;
use crate::error::{Cancel, FlowError, FlowResult};
use crate::flowlet::{FlowState, Flowlet};
use crate::params::Params;

pub(crate) type Handle = usize;

/// The context of the thread that owns the runtime.
pub(crate) const ROOT: Handle = 0;

/// Code run by a flowlet. Receives its in-body handle and the deferred
/// construction parameters; the returned value is delivered outward.
pub trait Body<V>: FnOnce(&Cx<V>, Params<V>) -> FlowResult<Option<V>> + Send + 'static {}

impl<V, F> Body<V> for F where F: FnOnce(&Cx<V>, Params<V>) -> FlowResult<Option<V>> + Send + 'static {}

pub(crate) type BoxedBody<V> = Box<dyn FnOnce(&Cx<V>, Params<V>) -> FlowResult<Option<V>> + Send>;

/// Left: first activation with the deferred parameters. Right: a plain
/// transfer of zero or one value.
pub(crate) type Payload<V> = Either<Params<V>, Option<V>>;

/// What a parked context wakes up with.
pub(crate) type Delivery<V> = FlowResult<Option<V>>;

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: Cell<Option<(u64, Handle)>> = const { Cell::new(None) };
    static CURRENT_FLOWLET: RefCell<Option<Box<dyn Any>>> = const { RefCell::new(None) };
}

/// The flowlet wrapping the context running on this thread, if any.
///
/// Returns `None` outside a flowlet body, or when the body belongs to a
/// runtime over a different value type.
pub fn current<V: Clone + Send + 'static>() -> Option<Flowlet<V>> {
    CURRENT_FLOWLET.with(|slot| {
        slot.borrow()
            .as_ref()
            .and_then(|any| any.downcast_ref::<Flowlet<V>>())
            .cloned()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    /// Created, never activated. No thread exists yet.
    Fresh,
    Running,
    /// Parked inside a switch, waiting for the turn.
    Suspended,
    Dead,
}

pub(crate) struct Context<V> {
    pub(crate) status: Status,
    pub(crate) parent: Handle,
    pub(crate) body: Option<BoxedBody<V>>,
    pub(crate) mailbox: Option<Delivery<V>>,
    /// Sticky cancellation: once set, every switch attempt fails with it.
    pub(crate) cancel: Option<Cancel>,
    pub(crate) thread: Option<JoinHandle<()>>,
}

impl<V> Context<V> {
    fn fresh(parent: Handle, body: Option<BoxedBody<V>>) -> Self {
        Self {
            status: Status::Fresh,
            parent,
            body,
            mailbox: None,
            cancel: None,
            thread: None,
        }
    }

    /// Activated at least once and not finished.
    pub(crate) fn is_active(&self) -> bool {
        matches!(self.status, Status::Running | Status::Suspended)
    }

    pub(crate) fn is_started(&self) -> bool {
        self.status != Status::Fresh
    }
}

/// One arena entry: the context record and the flowlet wrapping it. The root
/// slot carries a detached flow state that is never consulted.
pub(crate) struct Slot<V> {
    pub(crate) context: Context<V>,
    pub(crate) flow: FlowState<V>,
}

pub(crate) struct Hub<V> {
    pub(crate) slots: Vec<Slot<V>>,
    running: Handle,
    /// Threads of finished contexts, joined by the next context to create or
    /// switch. A thread never joins itself.
    finished: Vec<JoinHandle<()>>,
}

impl<V> Hub<V> {
    pub(crate) fn context(&self, handle: Handle) -> &Context<V> {
        &self.slots[handle].context
    }

    pub(crate) fn flow(&self, handle: Handle) -> &FlowState<V> {
        &self.slots[handle].flow
    }

    pub(crate) fn flow_mut(&mut self, handle: Handle) -> &mut FlowState<V> {
        &mut self.slots[handle].flow
    }

    /// Rewire where `b` returns to when it yields outward or finishes.
    pub(crate) fn reflow(&mut self, a: Handle, b: Handle) {
        tracing::debug!(from = b, to = a, "reflow");
        self.slots[b].context.parent = a;
    }

    /// First context along `handle`'s parent chain that can receive control.
    fn live_parent(&self, handle: Handle) -> Handle {
        let mut target = self.slots[handle].context.parent;
        for _ in 0..self.slots.len() {
            if target == ROOT || self.slots[target].context.is_active() {
                return target;
            }
            target = self.slots[target].context.parent;
        }
        ROOT
    }

    /// Mark `dead` finished and post its outcome to the first live parent.
    /// Returns the context that must receive the turn.
    fn retire(&mut self, dead: Handle, outcome: Delivery<V>) -> Handle {
        let context = &mut self.slots[dead].context;
        context.status = Status::Dead;
        context.body = None;
        context.mailbox = None;
        if let Some(thread) = context.thread.take() {
            self.finished.push(thread);
        }

        let target = self.live_parent(dead);
        let receiver = &mut self.slots[target].context;
        let outcome = match (receiver.cancel, outcome) {
            (Some(reason), Ok(_)) => Err(FlowError::Cancelled(reason)),
            (_, outcome) => outcome,
        };
        receiver.mailbox = Some(outcome);
        target
    }
}

pub(crate) struct Shared<V> {
    id: u64,
    root_thread: ThreadId,
    pub(crate) config: RuntimeConfig,
    pub(crate) hub: Mutex<Hub<V>>,
    turn: Condvar,
}

impl<V: Clone + Send + 'static> Shared<V> {
    pub(crate) fn new(config: RuntimeConfig) -> Self {
        let root = Slot {
            context: Context {
                status: Status::Running,
                ..Context::fresh(ROOT, None)
            },
            flow: FlowState::new(Params::default()),
        };
        Self {
            id: NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed),
            root_thread: thread::current().id(),
            config,
            hub: Mutex::new(Hub {
                slots: vec![root],
                running: ROOT,
                finished: Vec::new(),
            }),
            turn: Condvar::new(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Hub<V>> {
        self.hub.lock()
    }

    /// Handle of the context running on the calling thread.
    pub(crate) fn current(&self) -> Handle {
        CURRENT.with(|cell| match cell.get() {
            Some((runtime, handle)) if runtime == self.id => handle,
            _ => ROOT,
        })
    }

    /// The calling context, provided the calling thread belongs to this runtime.
    fn caller(&self) -> FlowResult<Handle> {
        match self.current() {
            ROOT if thread::current().id() != self.root_thread => Err(FlowError::ProtocolViolation(
                "flowlet used from a thread outside its runtime",
            )),
            handle => Ok(handle),
        }
    }

    /// Register a new, never activated context whose return target is the
    /// calling context.
    pub(crate) fn create(&self, body: BoxedBody<V>, params: Params<V>) -> Handle {
        self.reap();
        let parent = self.current();
        let mut hub = self.lock();
        let handle = hub.slots.len();
        hub.slots.push(Slot {
            context: Context::fresh(parent, Some(body)),
            flow: FlowState::new(params),
        });
        tracing::debug!(context = handle, parent, "created context");
        handle
    }

    pub(crate) fn is_active(&self, handle: Handle) -> bool {
        self.lock().context(handle).is_active()
    }

    /// Join the threads of contexts that have finished since the last reap.
    pub(crate) fn reap(&self) {
        let finished = std::mem::take(&mut self.lock().finished);
        for thread in finished {
            if thread.join().is_err() {
                tracing::warn!("context thread panicked outside its body");
            }
        }
    }

    /// Transfer control into `to` and block until control comes back.
    pub(crate) fn switch_into(self: &Arc<Self>, to: Handle, payload: Payload<V>) -> Delivery<V> {
        let from = self.caller()?;
        self.reap();
        let mut hub = self.lock();
        if let Some(reason) = hub.context(from).cancel {
            return Err(FlowError::Cancelled(reason));
        }
        if to == from {
            return match payload {
                Either::Right(value) => Ok(value),
                Either::Left(_) => Err(FlowError::ProtocolViolation("context cannot start itself")),
            };
        }

        match (hub.context(to).status, payload) {
            (Status::Dead, _) => return Err(FlowError::DeadTarget),
            (Status::Running, _) => {
                return Err(FlowError::ProtocolViolation("target context is already running"));
            }
            (Status::Fresh, Either::Left(params)) => self.spawn(&mut hub, to, params)?,
            (Status::Fresh, Either::Right(_)) => {
                return Err(FlowError::ProtocolViolation("context was never activated"));
            }
            (Status::Suspended, Either::Left(_)) => {
                return Err(FlowError::ProtocolViolation("context was already activated"));
            }
            (Status::Suspended, Either::Right(value)) => {
                hub.slots[to].context.mailbox = Some(Ok(value));
            }
        }

        if self.config.trace_switches {
            tracing::trace!(from, to, "switch");
        }
        self.hand_over(&mut hub, from, to);
        self.park(&mut hub, from)
    }

    /// Yield outward: transfer to whatever activated the calling context.
    pub(crate) fn switch_up(self: &Arc<Self>, value: Option<V>) -> Delivery<V> {
        let parent = {
            let hub = self.lock();
            hub.live_parent(self.current())
        };
        self.switch_into(parent, Either::Right(value))
    }

    /// Raise a cancellation at `to`'s suspension point and block until control
    /// comes back. A never activated context is destroyed without running.
    pub(crate) fn throw_into(self: &Arc<Self>, to: Handle, reason: Cancel) -> Delivery<V> {
        let from = self.caller()?;
        if to == from {
            return Err(FlowError::Cancelled(reason));
        }
        let mut hub = self.lock();
        match hub.context(to).status {
            Status::Dead => return Ok(None),
            Status::Running => {
                return Err(FlowError::ProtocolViolation("cannot cancel a running context"));
            }
            Status::Fresh => {
                let target = hub.retire(to, Err(FlowError::Cancelled(reason)));
                if self.config.trace_switches {
                    tracing::trace!(context = to, "destroyed never activated context");
                }
                if target != from {
                    self.hand_over(&mut hub, from, target);
                }
            }
            Status::Suspended => {
                hub.slots[to].context.mailbox = Some(Err(FlowError::Cancelled(reason)));
                if self.config.trace_switches {
                    tracing::trace!(from, to, %reason, "throw");
                }
                self.hand_over(&mut hub, from, to);
            }
        }
        self.park(&mut hub, from)
    }

    fn hand_over(&self, hub: &mut Hub<V>, from: Handle, to: Handle) {
        hub.slots[from].context.status = Status::Suspended;
        hub.slots[to].context.status = Status::Running;
        hub.running = to;
        self.turn.notify_all();
    }

    fn park(&self, hub: &mut MutexGuard<'_, Hub<V>>, me: Handle) -> Delivery<V> {
        while hub.running != me {
            self.turn.wait(hub);
        }
        hub.slots[me].context.status = Status::Running;
        hub.slots[me].context.mailbox.take().unwrap_or(Ok(None))
    }

    /// Start the thread for `handle`. The body stays in its slot until the
    /// thread first gets the turn, so a failed spawn leaves the context fresh.
    fn spawn(self: &Arc<Self>, hub: &mut Hub<V>, handle: Handle, params: Params<V>) -> FlowResult<()> {
        if hub.slots[handle].context.body.is_none() {
            return Err(FlowError::ProtocolViolation("context has no body"));
        }

        let mut builder = thread::Builder::new().name(format!("{}-{}", self.config.thread_name, handle));
        if let Some(size) = self.config.stack_size {
            builder = builder.stack_size(size);
        }

        let shared = Arc::clone(self);
        let thread = builder.spawn(move || shared.run_context(handle, params))?;
        hub.slots[handle].context.thread = Some(thread);
        if self.config.trace_switches {
            tracing::trace!(context = handle, "spawned context thread");
        }
        Ok(())
    }

    fn run_context(self: Arc<Self>, me: Handle, params: Params<V>) {
        CURRENT.with(|cell| cell.set(Some((self.id, me))));
        CURRENT_FLOWLET.with(|slot| {
            *slot.borrow_mut() = Some(Box::new(Flowlet::from_parts(Arc::clone(&self), me)));
        });

        let body = {
            let mut hub = self.lock();
            while hub.running != me {
                self.turn.wait(&mut hub);
            }
            hub.slots[me].context.body.take()
        };

        let outcome = match body {
            Some(body) => {
                let cx = Cx::new(Arc::clone(&self), me);
                match panic::catch_unwind(AssertUnwindSafe(|| body(&cx, params))) {
                    Ok(outcome) => outcome,
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        tracing::warn!(context = me, %message, "flowlet body panicked");
                        Err(FlowError::Panicked(message))
                    }
                }
            }
            None => Err(FlowError::ProtocolViolation("context has no body")),
        };
        CURRENT_FLOWLET.with(|slot| slot.borrow_mut().take());

        let mut hub = self.lock();
        let outcome = match (hub.context(me).cancel, outcome) {
            (Some(Cancel::Exit), Ok(_)) => Err(FlowError::Cancelled(Cancel::Exit)),
            (_, outcome) => outcome,
        };
        let target = hub.retire(me, outcome);
        if self.config.trace_switches {
            tracing::trace!(context = me, to = target, "context finished");
        }
        hub.slots[target].context.status = Status::Running;
        hub.running = target;
        self.turn.notify_all();
    }

    /// Destroy every live context. Only valid on the root context.
    pub(crate) fn teardown(self: &Arc<Self>) {
        if self.caller().ok() != Some(ROOT) {
            tracing::warn!("runtime dropped away from its root context; skipping teardown");
            return;
        }

        let victims: Vec<Handle> = {
            let mut hub = self.lock();
            let mut victims = Vec::new();
            for (handle, slot) in hub.slots.iter_mut().enumerate().skip(1) {
                match slot.context.status {
                    Status::Fresh => {
                        slot.context.status = Status::Dead;
                        slot.context.body = None;
                    }
                    Status::Suspended => {
                        slot.context.cancel = Some(Cancel::Unwind);
                        victims.push(handle);
                    }
                    Status::Running | Status::Dead => {}
                }
            }
            victims
        };

        for &handle in victims.iter().rev() {
            {
                let mut hub = self.lock();
                if hub.context(handle).status != Status::Suspended {
                    continue;
                }
                hub.reflow(ROOT, handle);
            }
            tracing::warn!(context = handle, "cancelling live context at runtime drop");
            if let Err(err) = self.throw_into(handle, Cancel::Unwind) {
                if !err.is_cancelled() {
                    tracing::warn!(context = handle, error = %err, "context failed while unwinding");
                }
            }
        }

        let threads: Vec<JoinHandle<()>> = {
            let mut hub = self.lock();
            let mut threads = std::mem::take(&mut hub.finished);
            threads.extend(hub.slots.iter_mut().filter_map(|slot| slot.context.thread.take()));
            threads
        };
        for thread in threads {
            let _ = thread.join();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
