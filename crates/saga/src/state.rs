//! Execution status state machine.

use serde::{Deserialize, Serialize};

/// The status of a saga execution in its lifecycle.
///
/// Status transitions:
/// ```text
/// Running ──┬──► Completed
///           └──► Compensating ──┬──► Compensated
///                               └──► Failed
/// ```
///
/// `Failed` is reached when the compensation sweep itself had failures,
/// so the execution was only partially unwound; a clean sweep ends in
/// `Compensated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Forward steps are being executed.
    Running,

    /// All steps completed successfully (terminal).
    Completed,

    /// A step failed and compensations are in progress.
    Compensating,

    /// Every completed step was undone after a failure (terminal).
    Compensated,

    /// Compensation finished but one or more compensations failed
    /// (terminal).
    Failed,
}

impl ExecutionStatus {
    /// Returns true while forward steps are still being executed.
    pub fn is_running(&self) -> bool {
        matches!(self, ExecutionStatus::Running)
    }

    /// Returns true if compensation may begin from this status.
    pub fn can_compensate(&self) -> bool {
        matches!(self, ExecutionStatus::Running)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Compensated | ExecutionStatus::Failed
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Compensating => "compensating",
            ExecutionStatus::Compensated => "compensated",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
