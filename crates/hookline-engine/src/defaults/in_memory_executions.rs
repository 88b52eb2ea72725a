//! In-memory execution store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::errors::ExecutionStoreError;
use crate::traits::ExecutionStore;
use crate::types::{ExecutionRecord, ExecutionStatus};

/// In-memory implementation of [`ExecutionStore`].
///
/// Each transition checks and updates the status under one write lock, which
/// gives the same compare-and-set behavior as the conditional `UPDATE`s in
/// the SQL store.
pub struct InMemoryExecutionStore {
    records: Arc<RwLock<BTreeMap<String, ExecutionRecord>>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    async fn transition(
        &self,
        execution_id: &str,
        expected: ExecutionStatus,
        f: impl FnOnce(&mut ExecutionRecord),
    ) -> Result<ExecutionRecord, ExecutionStoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(execution_id)
            .ok_or_else(|| ExecutionStoreError::NotFound {
                id: execution_id.to_string(),
            })?;
        if record.status != expected {
            return Err(ExecutionStoreError::InvalidTransition {
                id: execution_id.to_string(),
                expected: expected.to_string(),
                actual: record.status.to_string(),
            });
        }
        f(record);
        Ok(record.clone())
    }
}

impl Default for InMemoryExecutionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn create(&self, record: &ExecutionRecord) -> Result<(), ExecutionStoreError> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, execution_id: &str) -> Result<Option<ExecutionRecord>, ExecutionStoreError> {
        Ok(self.records.read().await.get(execution_id).cloned())
    }

    async fn claim(&self, execution_id: &str) -> Result<ExecutionRecord, ExecutionStoreError> {
        self.transition(execution_id, ExecutionStatus::Pending, |r| {
            r.status = ExecutionStatus::Running;
        })
        .await
    }

    async fn record_step(&self, execution_id: &str) -> Result<u32, ExecutionStoreError> {
        self.transition(execution_id, ExecutionStatus::Running, |r| {
            r.steps_completed += 1;
        })
        .await
        .map(|r| r.steps_completed)
    }

    async fn complete(&self, execution_id: &str) -> Result<ExecutionRecord, ExecutionStoreError> {
        self.transition(execution_id, ExecutionStatus::Running, |r| {
            r.status = ExecutionStatus::Completed;
            r.completed_at = Some(Utc::now());
        })
        .await
    }

    async fn fail(
        &self,
        execution_id: &str,
        error_message: &str,
    ) -> Result<ExecutionRecord, ExecutionStoreError> {
        self.transition(execution_id, ExecutionStatus::Running, |r| {
            r.status = ExecutionStatus::Failed;
            r.error_message = Some(error_message.to_string());
            r.completed_at = Some(Utc::now());
        })
        .await
    }

    async fn list_pending_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ExecutionRecord>, ExecutionStoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.status == ExecutionStatus::Pending && r.started_at < cutoff)
            .cloned()
            .collect())
    }

    async fn list_running_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ExecutionRecord>, ExecutionStoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.status == ExecutionStatus::Running && r.started_at < cutoff)
            .cloned()
            .collect())
    }

    async fn list_for_automation(
        &self,
        automation_id: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>, ExecutionStoreError> {
        let mut runs: Vec<ExecutionRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.automation_id == automation_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }
}
