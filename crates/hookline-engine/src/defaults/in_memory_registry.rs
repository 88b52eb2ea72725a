//! In-memory subscription registry for testing and lightweight usage.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::errors::RegistryError;
use crate::traits::SubscriptionStore;
use crate::types::{NewSubscription, Subscription, SubscriptionPatch};

/// In-memory implementation of [`SubscriptionStore`].
///
/// Statistic updates happen under the write lock, so concurrent deliveries
/// to the same subscription never lose an increment.
pub struct InMemorySubscriptionStore {
    subscriptions: Arc<RwLock<BTreeMap<String, Subscription>>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Insert a fully-formed subscription, replacing any with the same id.
    pub async fn insert(&self, subscription: Subscription) {
        self.subscriptions
            .write()
            .await
            .insert(subscription.id.clone(), subscription);
    }

    async fn bump(
        &self,
        subscription_id: &str,
        f: impl FnOnce(&mut Subscription),
    ) -> Result<(), RegistryError> {
        let mut subs = self.subscriptions.write().await;
        let sub = subs
            .get_mut(subscription_id)
            .ok_or_else(|| RegistryError::NotFound {
                id: subscription_id.to_string(),
            })?;
        sub.total_calls += 1;
        sub.last_triggered = Some(Utc::now());
        f(sub);
        Ok(())
    }
}

impl Default for InMemorySubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn find_active(&self, event_name: &str) -> Result<Vec<Subscription>, RegistryError> {
        Ok(self
            .subscriptions
            .read()
            .await
            .values()
            .filter(|s| s.is_active && s.event_name == event_name)
            .cloned()
            .collect())
    }

    async fn record_success(&self, subscription_id: &str) -> Result<(), RegistryError> {
        self.bump(subscription_id, |s| s.success_count += 1).await
    }

    async fn record_failure(&self, subscription_id: &str) -> Result<(), RegistryError> {
        self.bump(subscription_id, |s| s.failure_count += 1).await
    }

    async fn create(&self, new: NewSubscription) -> Result<Subscription, RegistryError> {
        let sub = Subscription::new(new);
        self.insert(sub.clone()).await;
        Ok(sub)
    }

    async fn get(&self, subscription_id: &str) -> Result<Option<Subscription>, RegistryError> {
        Ok(self.subscriptions.read().await.get(subscription_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Subscription>, RegistryError> {
        Ok(self.subscriptions.read().await.values().cloned().collect())
    }

    async fn update(
        &self,
        subscription_id: &str,
        patch: SubscriptionPatch,
    ) -> Result<Subscription, RegistryError> {
        let mut subs = self.subscriptions.write().await;
        let sub = subs
            .get_mut(subscription_id)
            .ok_or_else(|| RegistryError::NotFound {
                id: subscription_id.to_string(),
            })?;
        sub.apply(patch);
        Ok(sub.clone())
    }

    async fn delete(&self, subscription_id: &str) -> Result<bool, RegistryError> {
        Ok(self
            .subscriptions
            .write()
            .await
            .remove(subscription_id)
            .is_some())
    }
}
