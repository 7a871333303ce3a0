//! Saga definitions: named, ordered step lists with lifecycle hooks.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::step::{SagaStep, StepResults};

pub(crate) type CompleteHook<C> =
    Arc<dyn Fn(Arc<C>, StepResults) -> BoxFuture<'static, ()> + Send + Sync>;
pub(crate) type FailHook<C> =
    Arc<dyn Fn(Arc<C>, String, Vec<String>) -> BoxFuture<'static, ()> + Send + Sync>;

/// A named saga: an ordered list of steps plus optional hooks invoked
/// after the terminal transition.
///
/// Definitions are immutable once registered; registering the same name
/// again replaces the previous definition (last write wins).
pub struct SagaDefinition<C> {
    name: String,
    steps: Vec<SagaStep<C>>,
    on_complete: Option<CompleteHook<C>>,
    on_fail: Option<FailHook<C>>,
}

impl<C> SagaDefinition<C>
where
    C: Send + Sync + 'static,
{
    /// Creates an empty definition with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            on_complete: None,
            on_fail: None,
        }
    }

    /// Appends a step; steps run in the order they are added.
    pub fn step(mut self, step: SagaStep<C>) -> Self {
        self.steps.push(step);
        self
    }

    /// Hook invoked with the context and full results map after every
    /// step completed.
    pub fn on_complete<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Arc<C>, StepResults) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_complete = Some(Arc::new(move |context, results| {
            Box::pin(hook(context, results))
        }));
        self
    }

    /// Hook invoked with the context, the failure message, and the list
    /// of steps that had completed before the failure.
    pub fn on_fail<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Arc<C>, String, Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_fail = Some(Arc::new(move |context, error, completed| {
            Box::pin(hook(context, error, completed))
        }));
        self
    }

    /// Returns the saga name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the steps in execution order.
    pub fn steps(&self) -> &[SagaStep<C>] {
        &self.steps
    }

    /// Returns the step names in execution order.
    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name().to_string()).collect()
    }

    pub(crate) fn find_step(&self, name: &str) -> Option<&SagaStep<C>> {
        self.steps.iter().find(|s| s.name() == name)
    }

    pub(crate) fn on_complete_hook(&self) -> Option<CompleteHook<C>> {
        self.on_complete.clone()
    }

    pub(crate) fn on_fail_hook(&self) -> Option<FailHook<C>> {
        self.on_fail.clone()
    }
}

impl<C> Clone for SagaDefinition<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            steps: self.steps.clone(),
            on_complete: self.on_complete.clone(),
            on_fail: self.on_fail.clone(),
        }
    }
}

impl<C> std::fmt::Debug for SagaDefinition<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagaDefinition")
            .field("name", &self.name)
            .field("steps", &self.steps.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}
