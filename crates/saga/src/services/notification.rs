//! Notification service trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// A dispatched notification as returned by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationReceipt {
    /// The notification ID assigned by the service.
    pub notification_id: String,
}

/// Trait for customer notification dispatch.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Sends a message to the recipient.
    async fn send(&self, recipient: &str, message: &str) -> Result<NotificationReceipt, SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryNotificationState {
    sent: Vec<(String, String)>,
    next_id: u32,
    fail_on_send: bool,
}

/// In-memory notification service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationService {
    state: Arc<RwLock<InMemoryNotificationState>>,
}

impl InMemoryNotificationService {
    /// Creates a new in-memory notification service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail on send.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.state.write().unwrap().fail_on_send = fail;
    }

    /// Returns the number of sent notifications.
    pub fn sent_count(&self) -> usize {
        self.state.read().unwrap().sent.len()
    }

    /// Returns all messages sent to the recipient.
    pub fn messages_for(&self, recipient: &str) -> Vec<String> {
        self.state
            .read()
            .unwrap()
            .sent
            .iter()
            .filter(|(to, _)| to == recipient)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationService for InMemoryNotificationService {
    async fn send(&self, recipient: &str, message: &str) -> Result<NotificationReceipt, SagaError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_send {
            return Err(SagaError::Notification("gateway unavailable".to_string()));
        }

        state.next_id += 1;
        let notification_id = format!("NTF-{:04}", state.next_id);
        state
            .sent
            .push((recipient.to_string(), message.to_string()));

        Ok(NotificationReceipt { notification_id })
    }
}
