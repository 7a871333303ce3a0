//! Execution records: the mutable state of one saga run.

use chrono::{DateTime, Utc};
use common::ExecutionId;
use serde::Serialize;
use serde_json::Value;

use crate::state::ExecutionStatus;
use crate::step::StepResults;

/// A compensation that failed during the unwind sweep.
///
/// Recorded and logged, never propagated; the sweep continues past it.
#[derive(Debug, Clone, Serialize)]
pub struct CompensationFailure {
    /// The step whose compensation failed.
    pub step: String,
    /// The compensation error message.
    pub error: String,
}

/// The record of one saga run.
///
/// Created when `execute` is called and mutated only by the task
/// driving that run; the registry holds snapshots taken at transition
/// points. The caller's context is handed to step handlers by `Arc`
/// and is not retained here.
#[derive(Debug, Clone, Serialize)]
pub struct SagaExecution {
    id: ExecutionId,
    saga_name: String,
    status: ExecutionStatus,
    current_step: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    results: StepResults,
    completed_steps: Vec<String>,
    compensated_steps: Vec<String>,
    compensation_failures: Vec<CompensationFailure>,
    failed_step: Option<String>,
    error: Option<String>,
}

impl SagaExecution {
    pub(crate) fn new(saga_name: impl Into<String>) -> Self {
        Self {
            id: ExecutionId::new(),
            saga_name: saga_name.into(),
            status: ExecutionStatus::Running,
            current_step: None,
            started_at: Utc::now(),
            completed_at: None,
            results: StepResults::new(),
            completed_steps: Vec::new(),
            compensated_steps: Vec::new(),
            compensation_failures: Vec::new(),
            failed_step: None,
            error: None,
        }
    }

    pub(crate) fn begin_step(&mut self, step: &str) {
        self.current_step = Some(step.to_string());
    }

    pub(crate) fn complete_step(&mut self, step: &str, result: Value) {
        self.results.insert(step, result);
        self.completed_steps.push(step.to_string());
    }

    pub(crate) fn complete(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.current_step = None;
    }

    pub(crate) fn begin_compensation(&mut self, failed_step: &str, error: String) {
        self.status = ExecutionStatus::Compensating;
        self.failed_step = Some(failed_step.to_string());
        self.error = Some(error);
    }

    pub(crate) fn record_compensated(&mut self, step: &str) {
        self.compensated_steps.push(step.to_string());
    }

    pub(crate) fn record_compensation_failure(&mut self, step: &str, error: String) {
        self.compensation_failures.push(CompensationFailure {
            step: step.to_string(),
            error,
        });
    }

    /// Ends the compensation sweep: a clean sweep terminates
    /// `Compensated`, a sweep with failures terminates `Failed`.
    pub(crate) fn finish_compensation(&mut self) {
        self.status = if self.compensation_failures.is_empty() {
            ExecutionStatus::Compensated
        } else {
            ExecutionStatus::Failed
        };
        self.completed_at = Some(Utc::now());
        self.current_step = None;
    }

    /// Returns the execution ID.
    pub fn id(&self) -> ExecutionId {
        self.id
    }

    /// Returns the saga name this execution belongs to.
    pub fn saga_name(&self) -> &str {
        &self.saga_name
    }

    /// Returns the current status.
    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    /// Returns the step currently being executed, if any.
    pub fn current_step(&self) -> Option<&str> {
        self.current_step.as_deref()
    }

    /// Returns when the execution started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns when the execution reached a terminal status.
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns the accumulated step results.
    pub fn results(&self) -> &StepResults {
        &self.results
    }

    /// Returns the names of completed steps in completion order.
    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    /// Returns the names of compensated steps in compensation order.
    pub fn compensated_steps(&self) -> &[String] {
        &self.compensated_steps
    }

    /// Returns the compensations that failed during the sweep.
    pub fn compensation_failures(&self) -> &[CompensationFailure] {
        &self.compensation_failures
    }

    /// Returns the step whose failure triggered compensation.
    pub fn failed_step(&self) -> Option<&str> {
        self.failed_step.as_deref()
    }

    /// Returns the failure message, if the execution failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Outcome returned to the caller of `SagaOrchestrator::execute`.
#[derive(Debug, Clone, Serialize)]
pub struct SagaResult {
    /// True when every step completed.
    pub success: bool,
    /// The execution ID, valid for registry lookups.
    pub execution_id: ExecutionId,
    /// The full results map on success.
    pub data: Option<StepResults>,
    /// The failure message of the step that exhausted its retries.
    pub error: Option<String>,
    /// Steps that completed, in completion order.
    pub completed_steps: Vec<String>,
    /// Steps that were undone, in compensation order.
    pub compensated_steps: Vec<String>,
    /// Compensations that failed during the sweep.
    pub compensation_failures: Vec<CompensationFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_execution_is_running() {
        let execution = SagaExecution::new("place_order");
        assert_eq!(execution.saga_name(), "place_order");
        assert_eq!(execution.status(), ExecutionStatus::Running);
        assert!(execution.completed_at().is_none());
        assert!(execution.completed_steps().is_empty());
    }

    #[test]
    fn test_forward_lifecycle() {
        let mut execution = SagaExecution::new("place_order");

        execution.begin_step("validate");
        assert_eq!(execution.current_step(), Some("validate"));

        execution.complete_step("validate", serde_json::json!({"hold_id": "HOLD-0001"}));
        assert_eq!(execution.completed_steps(), &["validate"]);
        assert!(execution.results().contains("validate"));

        execution.complete();
        assert_eq!(execution.status(), ExecutionStatus::Completed);
        assert!(execution.completed_at().is_some());
        assert!(execution.current_step().is_none());
    }

    #[test]
    fn test_clean_compensation_ends_compensated() {
        let mut execution = SagaExecution::new("place_order");
        execution.complete_step("validate", Value::Null);
        execution.complete_step("create", Value::Null);

        execution.begin_compensation("pay", "card declined".to_string());
        assert_eq!(execution.status(), ExecutionStatus::Compensating);
        assert_eq!(execution.failed_step(), Some("pay"));
        assert_eq!(execution.error(), Some("card declined"));

        execution.record_compensated("create");
        execution.record_compensated("validate");
        execution.finish_compensation();

        assert_eq!(execution.status(), ExecutionStatus::Compensated);
        assert_eq!(execution.compensated_steps(), &["create", "validate"]);
        assert!(execution.compensation_failures().is_empty());
    }

    #[test]
    fn test_failed_compensation_ends_failed() {
        let mut execution = SagaExecution::new("place_order");
        execution.complete_step("validate", Value::Null);
        execution.complete_step("create", Value::Null);

        execution.begin_compensation("pay", "card declined".to_string());
        execution.record_compensation_failure("create", "store unavailable".to_string());
        execution.record_compensated("validate");
        execution.finish_compensation();

        assert_eq!(execution.status(), ExecutionStatus::Failed);
        assert_eq!(execution.compensated_steps(), &["validate"]);
        assert_eq!(execution.compensation_failures().len(), 1);
        assert_eq!(execution.compensation_failures()[0].step, "create");
    }
}
