//! Resilience error types.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the resilience wrappers around an operation
/// whose own error type is `E`.
#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    /// The operation did not finish before its deadline.
    #[error("operation '{name}' timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    /// The circuit guarding the dependency is open; the call was
    /// rejected without invoking the operation.
    #[error("circuit '{name}' is open")]
    CircuitOpen { name: String },

    /// The spawned operation ended without producing a result.
    #[error("operation '{name}' aborted: {reason}")]
    Aborted { name: String, reason: String },

    /// The operation itself failed.
    #[error(transparent)]
    Inner(E),
}

impl<E> ResilienceError<E> {
    /// Returns true for a timeout failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ResilienceError::Timeout { .. })
    }

    /// Returns true when the call was rejected by an open circuit.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    /// Returns the operation's own error, if that is what happened.
    pub fn into_inner(self) -> Option<E> {
        match self {
            ResilienceError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct TestError;

    #[test]
    fn test_timeout_display_carries_duration() {
        let err: ResilienceError<TestError> = ResilienceError::Timeout {
            name: "payment".to_string(),
            timeout: Duration::from_millis(250),
        };
        assert!(err.is_timeout());
        assert!(err.to_string().contains("payment"));
        assert!(err.to_string().contains("250ms"));
    }

    #[test]
    fn test_inner_passthrough() {
        let err: ResilienceError<TestError> = ResilienceError::Inner(TestError);
        assert_eq!(err.to_string(), "boom");
        assert!(err.into_inner().is_some());
    }

    #[test]
    fn test_circuit_open_classification() {
        let err: ResilienceError<TestError> = ResilienceError::CircuitOpen {
            name: "payment".to_string(),
        };
        assert!(err.is_circuit_open());
        assert!(err.into_inner().is_none());
    }
}
