//! Left-to-right pipeline assembly.

use crate::build::from_iter;
use crate::context::Body;
use crate::error::{FlowError, FlowResult};
use crate::flowlet::Flowlet;
use crate::params::Params;
use crate::runtime::Runtime;

/// Stages bound left to right: each new stage awaits from the previous one.
///
/// ```rust
/// use flowlet::prelude::*;
///
/// let rt = Runtime::new();
/// let out = Pipeline::new(&rt)
///     .source(1..=6)
///     .then(filter(|x: &i32| x % 2 == 0))
///     .and_then(|p| p.then(pipe(|x| x * 10)))
///     .and_then(Pipeline::run)
///     .unwrap();
/// assert_eq!(out, vec![20, 40, 60]);
/// ```
pub struct Pipeline<'rt, V: Clone + Send + 'static> {
    runtime: &'rt Runtime<V>,
    stages: Vec<Flowlet<V>>,
}

impl<'rt, V: Clone + Send + 'static> Pipeline<'rt, V> {
    pub fn new(runtime: &'rt Runtime<V>) -> Self {
        Self {
            runtime,
            stages: Vec::new(),
        }
    }

    /// Start the pipeline with a stage sending every item of `items`.
    pub fn source<I>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = V> + Send + 'static,
    {
        let head = self.runtime.flowlet(from_iter(items), Params::new());
        if let Some(last) = self.stages.last() {
            tracing::warn!(stage = last.id(), "source replaces existing pipeline stages");
        }
        self.stages = vec![head];
        self
    }

    /// Append a stage built from `body` and bind it to the current end.
    pub fn then<B: Body<V>>(self, body: B) -> FlowResult<Self> {
        self.then_with(body, Params::new())
    }

    pub fn then_with<B: Body<V>>(self, body: B, params: Params<V>) -> FlowResult<Self> {
        let stage = self.runtime.flowlet(body, params);
        self.then_flowlet(stage)
    }

    /// Append an existing, not yet started flowlet.
    pub fn then_flowlet(mut self, stage: Flowlet<V>) -> FlowResult<Self> {
        if let Some(last) = self.stages.last() {
            stage.bind(last)?;
        }
        self.stages.push(stage);
        Ok(self)
    }

    pub fn stages(&self) -> &[Flowlet<V>] {
        &self.stages
    }

    pub fn terminal(&self) -> Option<&Flowlet<V>> {
        self.stages.last()
    }

    /// Iterate the terminal stage to exhaustion and collect what it sends.
    ///
    /// The chain is torn down whether iteration succeeds or fails.
    pub fn run(self) -> FlowResult<Vec<V>> {
        let terminal = self
            .terminal()
            .cloned()
            .ok_or(FlowError::ProtocolViolation("pipeline has no stages"))?;
        tracing::debug!(stages = self.stages.len(), terminal = terminal.id(), "pipeline run");

        let outcome = terminal.iter().collect::<FlowResult<Vec<V>>>();
        if outcome.is_err() && !terminal.is_finalized() {
            match terminal.finalize() {
                Ok(()) | Err(FlowError::AlreadyDead) => {}
                Err(err) => tracing::warn!(error = %err, "pipeline teardown failed"),
            }
        }
        outcome
    }
}
