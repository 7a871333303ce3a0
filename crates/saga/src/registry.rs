//! In-memory registry of saga executions with age-based cleanup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::ExecutionId;
use tokio::sync::RwLock;

use crate::execution::SagaExecution;

/// Default retention for terminal executions.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Tracks in-flight and completed saga executions, queryable by id.
///
/// The registry stores whole-record snapshots written by the driving
/// task at transition points; reads never observe a half-applied step.
/// No entry is removed while its status is still running.
#[derive(Debug, Clone, Default)]
pub struct ExecutionRegistry {
    executions: Arc<RwLock<HashMap<ExecutionId, SagaExecution>>>,
}

impl ExecutionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn store(&self, execution: SagaExecution) {
        self.executions
            .write()
            .await
            .insert(execution.id(), execution);
    }

    /// Returns a snapshot of the execution with the given ID.
    pub async fn get(&self, id: ExecutionId) -> Option<SagaExecution> {
        self.executions.read().await.get(&id).cloned()
    }

    /// Returns snapshots of all executions of the named saga.
    pub async fn get_for_saga(&self, saga_name: &str) -> Vec<SagaExecution> {
        self.executions
            .read()
            .await
            .values()
            .filter(|e| e.saga_name() == saga_name)
            .cloned()
            .collect()
    }

    /// Returns the number of tracked executions.
    pub async fn len(&self) -> usize {
        self.executions.read().await.len()
    }

    /// Returns true if no execution is tracked.
    pub async fn is_empty(&self) -> bool {
        self.executions.read().await.is_empty()
    }

    /// Removes terminal executions whose completion is older than
    /// `max_age`, returning how many were removed. Running executions
    /// have no completion time and are always kept.
    pub async fn cleanup(&self, max_age: Duration) -> usize {
        let cutoff = chrono::Utc::now()
            - chrono::TimeDelta::from_std(max_age).unwrap_or(chrono::TimeDelta::MAX);

        let mut executions = self.executions.write().await;
        let before = executions.len();
        executions.retain(|_, e| match e.completed_at() {
            Some(done) => done > cutoff,
            None => true,
        });
        let removed = before - executions.len();

        if removed > 0 {
            tracing::debug!(removed, "swept aged saga executions");
        }
        removed
    }

    /// Spawns a background task that sweeps the registry every `every`,
    /// removing terminal executions older than `max_age`.
    pub fn spawn_cleanup(&self, every: Duration, max_age: Duration) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick fires immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                registry.cleanup(max_age).await;
            }
        })
    }
}
