//! Saga steps: named units of work with execute and compensate actions.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SagaError;

/// Default per-attempt deadline for a step's execute.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);
/// Default total attempt count for a step's execute.
pub const DEFAULT_STEP_RETRIES: u32 = 3;

/// Results accumulated from completed steps, keyed by step name.
///
/// Steps never call each other directly; this map is their only
/// communication channel. Values are stored as JSON and read back
/// through the typed accessors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepResults {
    entries: HashMap<String, Value>,
}

impl StepResults {
    /// Creates an empty results map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw JSON result of a step, if it completed.
    pub fn raw(&self, step: &str) -> Option<&Value> {
        self.entries.get(step)
    }

    /// Deserializes the result of a step, if it completed.
    pub fn get<T: DeserializeOwned>(&self, step: &str) -> serde_json::Result<Option<T>> {
        self.entries
            .get(step)
            .cloned()
            .map(serde_json::from_value)
            .transpose()
    }

    /// Deserializes the result of a step that must have completed.
    pub fn require<T: DeserializeOwned>(&self, step: &str) -> Result<T, SagaError> {
        self.get(step)?
            .ok_or_else(|| SagaError::step(step, "required prior result is missing"))
    }

    /// Returns true if the step has a recorded result.
    pub fn contains(&self, step: &str) -> bool {
        self.entries.contains_key(step)
    }

    /// Returns the number of recorded results.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no step has completed yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn insert(&mut self, step: impl Into<String>, value: Value) {
        self.entries.insert(step.into(), value);
    }
}

pub(crate) type ExecuteFn<C> =
    Arc<dyn Fn(Arc<C>, StepResults) -> BoxFuture<'static, Result<Value, SagaError>> + Send + Sync>;
pub(crate) type CompensateFn<C> =
    Arc<dyn Fn(Arc<C>, Value, StepResults) -> BoxFuture<'static, Result<(), SagaError>> + Send + Sync>;

/// One named unit of work inside a saga definition.
///
/// `execute` receives the caller's context and the results of all prior
/// steps; its (serialized) return value is stored under the step name.
/// `compensate` receives the context, the step's own stored result, and
/// the full results map. Compensations must be idempotent and tolerant
/// of a partially-applied execute.
pub struct SagaStep<C> {
    name: String,
    timeout: Duration,
    retries: u32,
    execute: ExecuteFn<C>,
    compensate: Option<CompensateFn<C>>,
}

impl<C> SagaStep<C>
where
    C: Send + Sync + 'static,
{
    /// Creates a step from its name and execute action.
    pub fn new<F, Fut, T>(name: impl Into<String>, execute: F) -> Self
    where
        F: Fn(Arc<C>, StepResults) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, SagaError>> + Send + 'static,
        T: Serialize + Send,
    {
        Self {
            name: name.into(),
            timeout: DEFAULT_STEP_TIMEOUT,
            retries: DEFAULT_STEP_RETRIES,
            execute: Arc::new(move |context, prior| {
                let fut = execute(context, prior);
                Box::pin(async move {
                    let value = fut.await?;
                    serde_json::to_value(value).map_err(SagaError::from)
                })
            }),
            compensate: None,
        }
    }

    /// Overrides the per-attempt deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the total attempt count, clamped to at least one.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries.max(1);
        self
    }

    /// Attaches the compensating action invoked when a later step fails.
    pub fn with_compensation<F, Fut>(mut self, compensate: F) -> Self
    where
        F: Fn(Arc<C>, Value, StepResults) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SagaError>> + Send + 'static,
    {
        self.compensate = Some(Arc::new(move |context, result, results| {
            Box::pin(compensate(context, result, results))
        }));
        self
    }

    /// Returns the per-attempt deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the total attempt count.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Returns true if the step has a compensating action.
    pub fn has_compensation(&self) -> bool {
        self.compensate.is_some()
    }

    pub(crate) fn execute_handler(&self) -> ExecuteFn<C> {
        self.execute.clone()
    }

    pub(crate) fn compensate_handler(&self) -> Option<CompensateFn<C>> {
        self.compensate.clone()
    }
}

impl<C> SagaStep<C> {
    /// Returns the step name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<C> Clone for SagaStep<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            timeout: self.timeout,
            retries: self.retries,
            execute: self.execute.clone(),
            compensate: self.compensate.clone(),
        }
    }
}

impl<C> std::fmt::Debug for SagaStep<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagaStep")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("has_compensation", &self.compensate.is_some())
            .finish()
    }
}
