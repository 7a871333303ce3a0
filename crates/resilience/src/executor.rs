//! Composes circuit breaking, retries, and timeouts around one operation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::breaker::CircuitBreaker;
use crate::error::ResilienceError;
use crate::retry::RetryPolicy;
use crate::timeout::with_timeout;

/// Default per-attempt deadline.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// The general-purpose "call something that might fail" primitive.
///
/// Wraps an operation in, outermost first: circuit breaker, retry with
/// backoff, per-attempt timeout. Exhausted retries count as a single
/// failure against the breaker. Success and failure are recorded
/// through the `metrics` facade; a missing recorder makes those no-ops,
/// so observability can never affect the call outcome.
#[derive(Debug, Clone)]
pub struct ResilienceExecutor {
    name: String,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl ResilienceExecutor {
    /// Creates an executor for the named dependency using the given
    /// (typically long-lived, shared) breaker.
    pub fn new(name: impl Into<String>, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            name: name.into(),
            breaker,
            retry: RetryPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Overrides the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides the per-attempt deadline.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Returns the breaker guarding this dependency.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Runs `operation` under the full breaker → retry → timeout stack.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let started = Instant::now();
        let result = self
            .breaker
            .call(self.retry.run(&self.name, || {
                with_timeout(&self.name, self.call_timeout, operation())
            }))
            .await;

        match &result {
            Ok(_) => {
                metrics::histogram!("resilience_call_duration_seconds", "dependency" => self.name.clone())
                    .record(started.elapsed().as_secs_f64());
                metrics::counter!("resilience_calls_total", "dependency" => self.name.clone(), "outcome" => "success")
                    .increment(1);
            }
            Err(e) => {
                metrics::counter!("resilience_calls_total", "dependency" => self.name.clone(), "outcome" => "error")
                    .increment(1);
                tracing::warn!(dependency = %self.name, error = %e, "resilient call failed");
            }
        }

        result
    }

    /// Like [`execute`](Self::execute), but when the circuit is open
    /// the fallback supplies the value instead of the rejection being
    /// propagated.
    pub async fn execute_or<T, E, F, Fut, FB, FbFut>(
        &self,
        operation: F,
        fallback: FB,
    ) -> Result<T, ResilienceError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: std::fmt::Display + Send + 'static,
        FB: FnOnce() -> FbFut,
        FbFut: Future<Output = T>,
    {
        match self.execute(operation).await {
            Err(ResilienceError::CircuitOpen { .. }) => {
                metrics::counter!("resilience_fallbacks_total", "dependency" => self.name.clone())
                    .increment(1);
                tracing::warn!(dependency = %self.name, "circuit open, serving fallback");
                Ok(fallback().await)
            }
            other => other,
        }
    }
}
