//! Payment service wrapper that routes calls through the resilience
//! executor.
//!
//! Saga-level retry stays orthogonal to dependency-level circuit
//! breaking: the orchestrator never wraps a breaker around a step, and
//! services that call an external dependency are expected to carry one
//! internally. This wrapper is that layer for the payment provider.

use std::sync::Arc;

use async_trait::async_trait;
use resilience::{CircuitBreaker, CircuitBreakerConfig, ResilienceError, ResilienceExecutor};

use crate::error::SagaError;
use crate::services::payment::{PaymentCapture, PaymentService};

/// Wraps a [`PaymentService`] in the payment-provider breaker preset
/// plus retry and timeout.
#[derive(Clone)]
pub struct ResilientPaymentService<P> {
    inner: Arc<P>,
    executor: ResilienceExecutor,
}

impl<P> ResilientPaymentService<P>
where
    P: PaymentService + 'static,
{
    /// Wraps `inner` with a fresh payment breaker.
    pub fn new(inner: P) -> Self {
        let breaker = Arc::new(CircuitBreaker::new("payment", CircuitBreakerConfig::payment()));
        Self::with_executor(inner, ResilienceExecutor::new("payment", breaker))
    }

    /// Wraps `inner` with a caller-configured executor, e.g. to share a
    /// long-lived breaker between call sites.
    pub fn with_executor(inner: P, executor: ResilienceExecutor) -> Self {
        Self {
            inner: Arc::new(inner),
            executor,
        }
    }

    /// Returns the breaker guarding the payment provider.
    pub fn breaker(&self) -> &CircuitBreaker {
        self.executor.breaker()
    }
}

#[async_trait]
impl<P> PaymentService for ResilientPaymentService<P>
where
    P: PaymentService + 'static,
{
    async fn capture(
        &self,
        order_id: &str,
        amount_cents: i64,
        idempotency_key: &str,
    ) -> Result<PaymentCapture, SagaError> {
        let inner = self.inner.clone();
        let order_id = order_id.to_string();
        let idempotency_key = idempotency_key.to_string();

        self.executor
            .execute(move || {
                let inner = inner.clone();
                let order_id = order_id.clone();
                let idempotency_key = idempotency_key.clone();
                async move {
                    inner
                        .capture(&order_id, amount_cents, &idempotency_key)
                        .await
                }
            })
            .await
            .map_err(into_payment_error)
    }

    async fn refund(&self, payment_id: &str) -> Result<(), SagaError> {
        let inner = self.inner.clone();
        let payment_id = payment_id.to_string();

        self.executor
            .execute(move || {
                let inner = inner.clone();
                let payment_id = payment_id.clone();
                async move { inner.refund(&payment_id).await }
            })
            .await
            .map_err(into_payment_error)
    }
}

fn into_payment_error(error: ResilienceError<SagaError>) -> SagaError {
    match error {
        ResilienceError::Inner(e) => e,
        other => SagaError::Payment(other.to_string()),
    }
}
