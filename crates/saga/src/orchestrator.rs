//! Saga orchestrator: registers definitions and drives executions.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use common::ExecutionId;
use resilience::{ResilienceError, RetryPolicy, with_timeout};
use serde_json::Value;

use crate::definition::SagaDefinition;
use crate::error::SagaError;
use crate::execution::{SagaExecution, SagaResult};
use crate::registry::ExecutionRegistry;
use crate::step::{SagaStep, StepResults};

/// Coordinates multi-step transactions over registered definitions.
///
/// Each execution runs its steps strictly in order; later steps consume
/// the results of earlier ones through the accumulated results map. A
/// step failure after exhausted retries triggers compensation of every
/// completed step, most-recent-first. Distinct executions run fully
/// concurrently; the only shared mutable state is the execution
/// registry.
///
/// The orchestrator is an explicitly constructed object: build one per
/// application (or per test) rather than sharing a global.
pub struct SagaOrchestrator<C> {
    definitions: RwLock<HashMap<String, Arc<SagaDefinition<C>>>>,
    registry: ExecutionRegistry,
}

impl<C> SagaOrchestrator<C>
where
    C: Send + Sync + 'static,
{
    /// Creates an orchestrator with its own empty registry.
    pub fn new() -> Self {
        Self::with_registry(ExecutionRegistry::new())
    }

    /// Creates an orchestrator over an externally owned registry.
    pub fn with_registry(registry: ExecutionRegistry) -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
            registry,
        }
    }

    /// Returns the execution registry.
    pub fn registry(&self) -> &ExecutionRegistry {
        &self.registry
    }

    /// Registers a definition under its name.
    ///
    /// Registering a name twice replaces the earlier definition (last
    /// write wins, logged as a warning). The only structural validation
    /// is a non-empty step list.
    pub fn register(&self, definition: SagaDefinition<C>) -> Result<(), SagaError> {
        if definition.steps().is_empty() {
            return Err(SagaError::EmptyDefinition(definition.name().to_string()));
        }

        let name = definition.name().to_string();
        let replaced = self
            .definitions
            .write()
            .unwrap()
            .insert(name.clone(), Arc::new(definition));

        if replaced.is_some() {
            tracing::warn!(saga = %name, "saga definition replaced");
        } else {
            tracing::info!(saga = %name, "saga definition registered");
        }
        Ok(())
    }

    /// Returns the names of all registered definitions.
    pub fn definition_names(&self) -> Vec<String> {
        self.definitions.read().unwrap().keys().cloned().collect()
    }

    /// Runs the named saga with the given context.
    ///
    /// Returns `Err` only when the name is unregistered; every
    /// step-level failure is absorbed into the returned result after
    /// compensation has run.
    #[tracing::instrument(skip(self, context), fields(saga = %saga_name))]
    pub async fn execute(&self, saga_name: &str, context: C) -> Result<SagaResult, SagaError> {
        let definition = self
            .definitions
            .read()
            .unwrap()
            .get(saga_name)
            .cloned()
            .ok_or_else(|| SagaError::DefinitionNotFound(saga_name.to_string()))?;

        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = tokio::time::Instant::now();

        let context = Arc::new(context);
        let mut execution = SagaExecution::new(saga_name);
        self.registry.store(execution.clone()).await;
        tracing::info!(execution_id = %execution.id(), "saga execution started");

        let mut failure: Option<(String, SagaError)> = None;
        for step in definition.steps() {
            execution.begin_step(step.name());
            self.registry.store(execution.clone()).await;
            tracing::info!(step = step.name(), "saga step started");

            match self.run_step(step, &context, execution.results()).await {
                Ok(value) => {
                    execution.complete_step(step.name(), value);
                    self.registry.store(execution.clone()).await;
                }
                Err(e) => {
                    failure = Some((step.name().to_string(), e));
                    break;
                }
            }
        }

        let result = match failure {
            None => {
                execution.complete();
                self.registry.store(execution.clone()).await;

                if let Some(hook) = definition.on_complete_hook() {
                    hook(context.clone(), execution.results().clone()).await;
                }

                metrics::counter!("saga_completed").increment(1);
                tracing::info!(execution_id = %execution.id(), "saga completed");

                SagaResult {
                    success: true,
                    execution_id: execution.id(),
                    data: Some(execution.results().clone()),
                    error: None,
                    completed_steps: execution.completed_steps().to_vec(),
                    compensated_steps: Vec::new(),
                    compensation_failures: Vec::new(),
                }
            }
            Some((failed_step, error)) => {
                let message = error.to_string();
                execution.begin_compensation(&failed_step, message.clone());
                self.registry.store(execution.clone()).await;
                tracing::warn!(
                    execution_id = %execution.id(),
                    step = %failed_step,
                    error = %message,
                    "saga step failed, compensating"
                );

                self.compensate(&definition, &context, &mut execution).await;
                execution.finish_compensation();
                self.registry.store(execution.clone()).await;

                if let Some(hook) = definition.on_fail_hook() {
                    hook(
                        context.clone(),
                        message.clone(),
                        execution.completed_steps().to_vec(),
                    )
                    .await;
                }

                metrics::counter!("saga_failed").increment(1);
                tracing::warn!(
                    execution_id = %execution.id(),
                    status = %execution.status(),
                    "saga failed and was unwound"
                );

                SagaResult {
                    success: false,
                    execution_id: execution.id(),
                    data: None,
                    error: Some(message),
                    completed_steps: execution.completed_steps().to_vec(),
                    compensated_steps: execution.compensated_steps().to_vec(),
                    compensation_failures: execution.compensation_failures().to_vec(),
                }
            }
        };

        metrics::histogram!("saga_duration_seconds").record(saga_start.elapsed().as_secs_f64());
        Ok(result)
    }

    /// Returns a snapshot of the execution with the given ID.
    pub async fn get_execution(&self, id: ExecutionId) -> Option<SagaExecution> {
        self.registry.get(id).await
    }

    /// Returns snapshots of all executions of the named saga.
    pub async fn get_executions(&self, saga_name: &str) -> Vec<SagaExecution> {
        self.registry.get_for_saga(saga_name).await
    }

    /// Runs one step under per-attempt timeout and retry with backoff.
    ///
    /// The error of the final attempt is propagated verbatim; a timeout
    /// is an ordinary retryable failure.
    async fn run_step(
        &self,
        step: &SagaStep<C>,
        context: &Arc<C>,
        prior: &StepResults,
    ) -> Result<Value, SagaError> {
        let policy = RetryPolicy::new(step.retries());
        let handler = step.execute_handler();

        policy
            .run(step.name(), || {
                let attempt = handler(context.clone(), prior.clone());
                let name = step.name().to_string();
                let timeout = step.timeout();
                async move {
                    with_timeout(&name, timeout, attempt)
                        .await
                        .map_err(|e| flatten_step_error(&name, e))
                }
            })
            .await
    }

    /// Unwinds completed steps in strict reverse completion order.
    ///
    /// A failing compensation is logged and recorded; the sweep always
    /// continues to the remaining steps. Steps without a compensating
    /// action are counted as trivially compensated.
    async fn compensate(
        &self,
        definition: &SagaDefinition<C>,
        context: &Arc<C>,
        execution: &mut SagaExecution,
    ) {
        let completed: Vec<String> = execution.completed_steps().to_vec();
        for step_name in completed.iter().rev() {
            let Some(step) = definition.find_step(step_name) else {
                tracing::warn!(step = %step_name, "completed step missing from definition");
                execution.record_compensation_failure(step_name, "step not in definition".into());
                continue;
            };

            let Some(handler) = step.compensate_handler() else {
                tracing::debug!(step = %step_name, "step has no compensation");
                execution.record_compensated(step_name);
                continue;
            };

            let own_result = execution
                .results()
                .raw(step_name)
                .cloned()
                .unwrap_or(Value::Null);

            match handler(context.clone(), own_result, execution.results().clone()).await {
                Ok(()) => {
                    execution.record_compensated(step_name);
                    tracing::info!(step = %step_name, "step compensated");
                }
                Err(e) => {
                    metrics::counter!("saga_compensation_failures").increment(1);
                    tracing::error!(
                        step = %step_name,
                        error = %e,
                        "compensation failed, continuing sweep"
                    );
                    execution.record_compensation_failure(step_name, e.to_string());
                }
            }
        }
    }
}

impl<C> Default for SagaOrchestrator<C>
where
    C: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

fn flatten_step_error(step: &str, error: ResilienceError<SagaError>) -> SagaError {
    match error {
        ResilienceError::Inner(e) => e,
        ResilienceError::Timeout { timeout, .. } => SagaError::StepTimeout {
            step: step.to_string(),
            timeout,
        },
        ResilienceError::Aborted { reason, .. } => SagaError::step(step, reason),
        ResilienceError::CircuitOpen { name } => {
            SagaError::step(step, format!("circuit '{name}' is open"))
        }
    }
}
