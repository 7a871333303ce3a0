//! Order store trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// A created order as returned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    /// The order ID assigned by the store.
    pub order_id: String,
}

/// Trait for order persistence operations.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Creates an order for the customer at the restaurant.
    async fn create(
        &self,
        customer_id: &str,
        restaurant_id: &str,
        total_cents: i64,
    ) -> Result<OrderRecord, SagaError>;

    /// Cancels a previously created order.
    async fn cancel(&self, order_id: &str) -> Result<(), SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryOrderState {
    orders: HashMap<String, (String, String, i64)>,
    next_id: u32,
    fail_on_create: bool,
    fail_on_cancel: bool,
}

/// In-memory order store for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<InMemoryOrderState>>,
}

impl InMemoryOrderStore {
    /// Creates a new in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to fail on order creation.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Configures the store to fail on order cancellation.
    pub fn set_fail_on_cancel(&self, fail: bool) {
        self.state.write().unwrap().fail_on_cancel = fail;
    }

    /// Returns the number of active (not cancelled) orders.
    pub fn order_count(&self) -> usize {
        self.state.read().unwrap().orders.len()
    }

    /// Returns true if an order exists with the given ID.
    pub fn has_order(&self, order_id: &str) -> bool {
        self.state.read().unwrap().orders.contains_key(order_id)
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(
        &self,
        customer_id: &str,
        restaurant_id: &str,
        total_cents: i64,
    ) -> Result<OrderRecord, SagaError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_create {
            return Err(SagaError::OrderStore("store unavailable".to_string()));
        }

        state.next_id += 1;
        let order_id = format!("ORD-{:04}", state.next_id);
        state.orders.insert(
            order_id.clone(),
            (
                customer_id.to_string(),
                restaurant_id.to_string(),
                total_cents,
            ),
        );

        Ok(OrderRecord { order_id })
    }

    async fn cancel(&self, order_id: &str) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_cancel {
            return Err(SagaError::OrderStore("store unavailable".to_string()));
        }

        state.orders.remove(order_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_cancel() {
        let store = InMemoryOrderStore::new();

        let record = store.create("CUST-1", "REST-1", 3700).await.unwrap();
        assert!(record.order_id.starts_with("ORD-"));
        assert_eq!(store.order_count(), 1);
        assert!(store.has_order(&record.order_id));

        store.cancel(&record.order_id).await.unwrap();
        assert_eq!(store.order_count(), 0);
    }

    #[tokio::test]
    async fn test_fail_on_create() {
        let store = InMemoryOrderStore::new();
        store.set_fail_on_create(true);

        let result = store.create("CUST-1", "REST-1", 3700).await;
        assert!(result.is_err());
        assert_eq!(store.order_count(), 0);
    }

    #[tokio::test]
    async fn test_sequential_order_ids() {
        let store = InMemoryOrderStore::new();

        let r1 = store.create("CUST-1", "REST-1", 1000).await.unwrap();
        let r2 = store.create("CUST-2", "REST-1", 2000).await.unwrap();

        assert_eq!(r1.order_id, "ORD-0001");
        assert_eq!(r2.order_id, "ORD-0002");
    }
}
