//! Saga error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during saga operations.
///
/// Step-level failures never escape `SagaOrchestrator::execute`; they
/// are absorbed into the returned `SagaResult` after compensation. Only
/// lookup and registration problems surface as `Err`.
#[derive(Debug, Error)]
pub enum SagaError {
    /// No definition is registered under the requested name.
    #[error("saga definition '{0}' is not registered")]
    DefinitionNotFound(String),

    /// A definition with no steps was submitted for registration.
    #[error("saga definition '{0}' has no steps")]
    EmptyDefinition(String),

    /// A step's execute failed.
    #[error("step '{step}' failed: {reason}")]
    StepFailed { step: String, reason: String },

    /// A step's execute did not finish before its per-attempt deadline.
    #[error("step '{step}' timed out after {timeout:?}")]
    StepTimeout { step: String, timeout: Duration },

    /// A compensation failed; logged and recorded, never propagated.
    #[error("compensation for step '{step}' failed: {reason}")]
    CompensationFailed { step: String, reason: String },

    /// Restaurant service error.
    #[error("restaurant service error: {0}")]
    Restaurant(String),

    /// Order store error.
    #[error("order store error: {0}")]
    OrderStore(String),

    /// Payment service error.
    #[error("payment service error: {0}")]
    Payment(String),

    /// Notification service error.
    #[error("notification service error: {0}")]
    Notification(String),

    /// Event publish error; call sites treat publishing as best-effort.
    #[error("event publish failed: {0}")]
    Publish(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SagaError {
    /// Shorthand for a step failure with a formatted reason.
    pub fn step(step: impl Into<String>, reason: impl Into<String>) -> Self {
        SagaError::StepFailed {
            step: step.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
