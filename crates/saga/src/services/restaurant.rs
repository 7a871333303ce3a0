//! Restaurant service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;
use crate::place_order::OrderItem;

/// A kitchen capacity hold placed while an order is being finalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KitchenHold {
    /// The hold ID assigned by the restaurant service.
    pub hold_id: String,
}

/// Trait for restaurant lookup and capacity operations.
#[async_trait]
pub trait RestaurantService: Send + Sync {
    /// Validates the order against the restaurant and places a kitchen
    /// hold for its items.
    async fn place_hold(
        &self,
        restaurant_id: &str,
        items: &[OrderItem],
    ) -> Result<KitchenHold, SagaError>;

    /// Releases a previously placed hold.
    async fn release_hold(&self, hold_id: &str) -> Result<(), SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryRestaurantState {
    holds: HashMap<String, (String, u32)>,
    next_id: u32,
    fail_on_hold: bool,
}

/// In-memory restaurant service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRestaurantService {
    state: Arc<RwLock<InMemoryRestaurantState>>,
}

impl InMemoryRestaurantService {
    /// Creates a new in-memory restaurant service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail on hold placement.
    pub fn set_fail_on_hold(&self, fail: bool) {
        self.state.write().unwrap().fail_on_hold = fail;
    }

    /// Returns the number of active holds.
    pub fn hold_count(&self) -> usize {
        self.state.read().unwrap().holds.len()
    }

    /// Returns true if a hold exists with the given ID.
    pub fn has_hold(&self, hold_id: &str) -> bool {
        self.state.read().unwrap().holds.contains_key(hold_id)
    }
}

#[async_trait]
impl RestaurantService for InMemoryRestaurantService {
    async fn place_hold(
        &self,
        restaurant_id: &str,
        items: &[OrderItem],
    ) -> Result<KitchenHold, SagaError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_hold {
            return Err(SagaError::Restaurant("kitchen at capacity".to_string()));
        }

        let quantity: u32 = items.iter().map(|i| i.quantity).sum();
        state.next_id += 1;
        let hold_id = format!("HOLD-{:04}", state.next_id);
        state
            .holds
            .insert(hold_id.clone(), (restaurant_id.to_string(), quantity));

        Ok(KitchenHold { hold_id })
    }

    async fn release_hold(&self, hold_id: &str) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap();
        state.holds.remove(hold_id);
        Ok(())
    }
}
