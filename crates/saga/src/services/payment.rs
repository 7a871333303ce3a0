//! Payment service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// A captured payment as returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCapture {
    /// The payment ID assigned by the provider.
    pub payment_id: String,
    /// The captured amount in cents.
    pub amount_cents: i64,
}

/// Trait for payment capture operations.
///
/// `capture` takes a caller-supplied idempotency key so a retried
/// request produces the same payment instead of a duplicate charge.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Captures a payment for the order.
    async fn capture(
        &self,
        order_id: &str,
        amount_cents: i64,
        idempotency_key: &str,
    ) -> Result<PaymentCapture, SagaError>;

    /// Refunds a previously captured payment.
    async fn refund(&self, payment_id: &str) -> Result<(), SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    payments: HashMap<String, (String, i64)>,
    by_idempotency_key: HashMap<String, PaymentCapture>,
    next_id: u32,
    capture_attempts: u32,
    fail_on_capture: bool,
    fail_times: u32,
}

/// In-memory payment service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentService {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentService {
    /// Creates a new in-memory payment service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to decline every capture.
    pub fn set_fail_on_capture(&self, fail: bool) {
        self.state.write().unwrap().fail_on_capture = fail;
    }

    /// Configures the service to decline the next `times` captures,
    /// then succeed.
    pub fn set_fail_times(&self, times: u32) {
        self.state.write().unwrap().fail_times = times;
    }

    /// Returns the number of active (not refunded) payments.
    pub fn payment_count(&self) -> usize {
        self.state.read().unwrap().payments.len()
    }

    /// Returns how many capture calls were made, including declined ones.
    pub fn capture_attempts(&self) -> u32 {
        self.state.read().unwrap().capture_attempts
    }

    /// Returns true if a payment exists with the given ID.
    pub fn has_payment(&self, payment_id: &str) -> bool {
        self.state.read().unwrap().payments.contains_key(payment_id)
    }
}

#[async_trait]
impl PaymentService for InMemoryPaymentService {
    async fn capture(
        &self,
        order_id: &str,
        amount_cents: i64,
        idempotency_key: &str,
    ) -> Result<PaymentCapture, SagaError> {
        let mut state = self.state.write().unwrap();
        state.capture_attempts += 1;

        // A replayed key returns the original capture unchanged.
        if let Some(existing) = state.by_idempotency_key.get(idempotency_key) {
            return Ok(existing.clone());
        }

        if state.fail_on_capture {
            return Err(SagaError::Payment("payment declined".to_string()));
        }
        if state.fail_times > 0 {
            state.fail_times -= 1;
            return Err(SagaError::Payment("provider unavailable".to_string()));
        }

        state.next_id += 1;
        let capture = PaymentCapture {
            payment_id: format!("PAY-{:04}", state.next_id),
            amount_cents,
        };
        state
            .payments
            .insert(capture.payment_id.clone(), (order_id.to_string(), amount_cents));
        state
            .by_idempotency_key
            .insert(idempotency_key.to_string(), capture.clone());

        Ok(capture)
    }

    async fn refund(&self, payment_id: &str) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap();
        state.payments.remove(payment_id);
        Ok(())
    }
}
