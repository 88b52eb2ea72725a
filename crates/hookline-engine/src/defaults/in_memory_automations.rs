//! In-memory automation store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::errors::AutomationStoreError;
use crate::traits::AutomationStore;
use crate::types::{AutomationDefinition, AutomationStatus, NewAutomation};

/// In-memory implementation of [`AutomationStore`].
pub struct InMemoryAutomationStore {
    automations: Arc<RwLock<BTreeMap<String, AutomationDefinition>>>,
}

impl InMemoryAutomationStore {
    pub fn new() -> Self {
        Self {
            automations: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Insert a definition as-is. Used to seed raw (possibly malformed)
    /// graphs that [`AutomationStore::create`] would accept anyway.
    pub async fn insert(&self, definition: AutomationDefinition) {
        self.automations
            .write()
            .await
            .insert(definition.id.clone(), definition);
    }

    async fn with_mut(
        &self,
        automation_id: &str,
        f: impl FnOnce(&mut AutomationDefinition),
    ) -> Result<(), AutomationStoreError> {
        let mut automations = self.automations.write().await;
        let def = automations
            .get_mut(automation_id)
            .ok_or_else(|| AutomationStoreError::NotFound {
                id: automation_id.to_string(),
            })?;
        f(def);
        Ok(())
    }
}

impl Default for InMemoryAutomationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AutomationStore for InMemoryAutomationStore {
    async fn create(&self, new: NewAutomation) -> Result<AutomationDefinition, AutomationStoreError> {
        let def = AutomationDefinition::new(new);
        self.insert(def.clone()).await;
        Ok(def)
    }

    async fn get(
        &self,
        automation_id: &str,
    ) -> Result<Option<AutomationDefinition>, AutomationStoreError> {
        Ok(self.automations.read().await.get(automation_id).cloned())
    }

    async fn list(&self) -> Result<Vec<AutomationDefinition>, AutomationStoreError> {
        Ok(self.automations.read().await.values().cloned().collect())
    }

    async fn set_status(
        &self,
        automation_id: &str,
        status: AutomationStatus,
    ) -> Result<(), AutomationStoreError> {
        self.with_mut(automation_id, |def| def.status = status).await
    }

    async fn record_run(&self, automation_id: &str) -> Result<(), AutomationStoreError> {
        self.with_mut(automation_id, |def| {
            def.total_runs += 1;
            def.last_run = Some(Utc::now());
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn list_active_skips_inactive() {
        let store = InMemoryAutomationStore::new();
        let on = store
            .create(NewAutomation {
                name: "on".into(),
                status: AutomationStatus::Active,
                workflow_nodes: json!([]),
            })
            .await
            .unwrap();
        let off = store
            .create(NewAutomation {
                name: "off".into(),
                status: AutomationStatus::Active,
                workflow_nodes: json!([]),
            })
            .await
            .unwrap();
        store
            .set_status(&off.id, AutomationStatus::Inactive)
            .await
            .unwrap();

        let active = store.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, on.id);
    }

    #[tokio::test]
    async fn record_run_bumps_counter() {
        let store = InMemoryAutomationStore::new();
        let def = store
            .create(NewAutomation {
                name: "a".into(),
                status: AutomationStatus::Active,
                workflow_nodes: json!([]),
            })
            .await
            .unwrap();
        store.record_run(&def.id).await.unwrap();
        store.record_run(&def.id).await.unwrap();

        let def = store.get(&def.id).await.unwrap().unwrap();
        assert_eq!(def.total_runs, 2);
        assert!(def.last_run.is_some());
        assert!(matches!(
            store.record_run("missing").await,
            Err(AutomationStoreError::NotFound { .. })
        ));
    }
}
