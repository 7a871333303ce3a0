//! Event publishing boundary used by saga step bodies.
//!
//! The orchestrator itself never publishes; step bodies emit domain
//! events as a fire-and-forget side effect. Publish failures are
//! logged, never propagated, since event delivery is not part of
//! transaction durability.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SagaError;

/// Fire-and-forget notification channel to the external event bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes one event.
    async fn publish(
        &self,
        event_type: &str,
        payload: Value,
        correlation_id: Option<String>,
        source: Option<String>,
    ) -> Result<(), SagaError>;
}

/// Publishes an event, logging any failure instead of propagating it.
pub async fn publish_best_effort(
    publisher: &dyn EventPublisher,
    event_type: &str,
    payload: Value,
    correlation_id: Option<String>,
    source: Option<String>,
) {
    if let Err(e) = publisher
        .publish(event_type, payload, correlation_id, source)
        .await
    {
        tracing::warn!(event_type, error = %e, "event publish failed, continuing");
    }
}

/// A published event captured by the in-memory publisher.
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub event_type: String,
    pub payload: Value,
    pub correlation_id: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    events: Vec<PublishedEvent>,
    fail_on_publish: bool,
}

/// In-memory event publisher for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventPublisher {
    state: Arc<RwLock<InMemoryPublisherState>>,
}

impl InMemoryEventPublisher {
    /// Creates a new in-memory publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the publisher to fail on subsequent publish calls.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().unwrap().fail_on_publish = fail;
    }

    /// Returns the number of captured events.
    pub fn event_count(&self) -> usize {
        self.state.read().unwrap().events.len()
    }

    /// Returns all captured events.
    pub fn events(&self) -> Vec<PublishedEvent> {
        self.state.read().unwrap().events.clone()
    }

    /// Returns the captured events of one type.
    pub fn events_of_type(&self, event_type: &str) -> Vec<PublishedEvent> {
        self.state
            .read()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(
        &self,
        event_type: &str,
        payload: Value,
        correlation_id: Option<String>,
        source: Option<String>,
    ) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_publish {
            return Err(SagaError::Publish("bus unavailable".to_string()));
        }

        state.events.push(PublishedEvent {
            event_type: event_type.to_string(),
            payload,
            correlation_id,
            source,
        });
        Ok(())
    }
}
