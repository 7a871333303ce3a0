//! Timeout guard: races an operation against a deadline.

use std::future::Future;
use std::time::Duration;

use crate::error::ResilienceError;

/// Races `operation` against `timeout`.
///
/// The operation is spawned onto the runtime and the deadline is applied
/// to the join handle, so a timeout only stops the *caller* from
/// observing the result: the underlying task keeps running in the
/// background until it finishes on its own. Callers that hold resources
/// inside the operation must account for that leakage.
pub async fn with_timeout<T, E, F>(
    name: &str,
    timeout: Duration,
    operation: F,
) -> Result<T, ResilienceError<E>>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let handle = tokio::spawn(operation);

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(e))) => Err(ResilienceError::Inner(e)),
        Ok(Err(join_err)) => Err(ResilienceError::Aborted {
            name: name.to_string(),
            reason: join_err.to_string(),
        }),
        Err(_) => {
            tracing::warn!(operation = name, ?timeout, "operation timed out");
            Err(ResilienceError::Timeout {
                name: name.to_string(),
                timeout,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("op failed")]
    struct OpError;

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let result: Result<u32, ResilienceError<OpError>> =
            with_timeout("fast", Duration::from_secs(1), async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<u32, ResilienceError<OpError>> =
            with_timeout("failing", Duration::from_secs(1), async { Err(OpError) }).await;
        assert!(matches!(result, Err(ResilienceError::Inner(OpError))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let result: Result<u32, ResilienceError<OpError>> =
            with_timeout("slow", Duration::from_millis(50), async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(42)
            })
            .await;

        match result {
            Err(ResilienceError::Timeout { name, timeout }) => {
                assert_eq!(name, "slow");
                assert_eq!(timeout, Duration::from_millis(50));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_work_continues_after_timeout() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let result: Result<(), ResilienceError<OpError>> =
            with_timeout("leaky", Duration::from_millis(50), async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(result.is_err());
        assert!(!finished.load(Ordering::SeqCst));

        // The spawned task is not cancelled by the timeout; give it time
        // to run to completion.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(finished.load(Ordering::SeqCst));
    }
}
