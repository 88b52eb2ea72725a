//! SeaORM-backed subscription registry.

use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveValue, DatabaseConnection, IntoActiveModel, QueryOrder};
use std::sync::Arc;

use crate::models::subscription;

use hookline_engine::errors::RegistryError;
use hookline_engine::traits::SubscriptionStore;
use hookline_engine::types::{NewSubscription, Subscription, SubscriptionPatch};

/// Database-backed store for webhook subscriptions.
///
/// Statistic updates are single `UPDATE ... SET col = col + 1` statements,
/// so concurrent deliveries never lose an increment.
pub struct SeaOrmSubscriptionStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmSubscriptionStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn bump(
        &self,
        subscription_id: &str,
        counter: subscription::Column,
    ) -> Result<(), RegistryError> {
        let now = chrono::Utc::now().naive_utc();
        let result = subscription::Entity::update_many()
            .col_expr(
                subscription::Column::TotalCalls,
                Expr::col(subscription::Column::TotalCalls).add(1),
            )
            .col_expr(counter, Expr::col(counter).add(1))
            .col_expr(subscription::Column::LastTriggered, Expr::value(now))
            .filter(subscription::Column::Id.eq(subscription_id))
            .exec(self.db.as_ref())
            .await
            .map_err(to_store_err)?;

        if result.rows_affected == 0 {
            return Err(RegistryError::NotFound {
                id: subscription_id.to_string(),
            });
        }
        Ok(())
    }
}

fn to_store_err(e: impl std::fmt::Display) -> RegistryError {
    RegistryError::Store {
        message: e.to_string(),
    }
}

fn count(v: i64) -> u64 {
    v.max(0) as u64
}

fn model_to_subscription(m: subscription::Model) -> Subscription {
    Subscription {
        id: m.id,
        name: m.name,
        event_name: m.event_name,
        url: m.url,
        is_active: m.is_active,
        total_calls: count(m.total_calls),
        success_count: count(m.success_count),
        failure_count: count(m.failure_count),
        last_triggered: m.last_triggered.map(|t| t.and_utc()),
    }
}

#[async_trait]
impl SubscriptionStore for SeaOrmSubscriptionStore {
    async fn find_active(&self, event_name: &str) -> Result<Vec<Subscription>, RegistryError> {
        let models = subscription::Entity::find()
            .filter(subscription::Column::EventName.eq(event_name))
            .filter(subscription::Column::IsActive.eq(true))
            .all(self.db.as_ref())
            .await
            .map_err(to_store_err)?;

        Ok(models.into_iter().map(model_to_subscription).collect())
    }

    async fn record_success(&self, subscription_id: &str) -> Result<(), RegistryError> {
        self.bump(subscription_id, subscription::Column::SuccessCount)
            .await
    }

    async fn record_failure(&self, subscription_id: &str) -> Result<(), RegistryError> {
        self.bump(subscription_id, subscription::Column::FailureCount)
            .await
    }

    async fn create(&self, new: NewSubscription) -> Result<Subscription, RegistryError> {
        let sub = Subscription::new(new);
        let model = subscription::ActiveModel {
            id: ActiveValue::Set(sub.id.clone()),
            name: ActiveValue::Set(sub.name.clone()),
            event_name: ActiveValue::Set(sub.event_name.clone()),
            url: ActiveValue::Set(sub.url.clone()),
            is_active: ActiveValue::Set(sub.is_active),
            total_calls: ActiveValue::Set(0),
            success_count: ActiveValue::Set(0),
            failure_count: ActiveValue::Set(0),
            last_triggered: ActiveValue::Set(None),
            created_at: ActiveValue::Set(chrono::Utc::now().naive_utc()),
        };

        subscription::Entity::insert(model)
            .exec(self.db.as_ref())
            .await
            .map_err(to_store_err)?;

        tracing::debug!(subscription_id = %sub.id, event_name = %sub.event_name, "subscription created");
        Ok(sub)
    }

    async fn get(&self, subscription_id: &str) -> Result<Option<Subscription>, RegistryError> {
        let model = subscription::Entity::find_by_id(subscription_id.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(to_store_err)?;

        Ok(model.map(model_to_subscription))
    }

    async fn list(&self) -> Result<Vec<Subscription>, RegistryError> {
        let models = subscription::Entity::find()
            .order_by_asc(subscription::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(to_store_err)?;

        Ok(models.into_iter().map(model_to_subscription).collect())
    }

    async fn update(
        &self,
        subscription_id: &str,
        patch: SubscriptionPatch,
    ) -> Result<Subscription, RegistryError> {
        let existing = subscription::Entity::find_by_id(subscription_id.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(to_store_err)?
            .ok_or_else(|| RegistryError::NotFound {
                id: subscription_id.to_string(),
            })?;

        // Only the patched columns are written; statistics stay untouched.
        let mut model = existing.into_active_model();
        if let Some(name) = patch.name {
            model.name = ActiveValue::Set(name);
        }
        if let Some(event_name) = patch.event_name {
            model.event_name = ActiveValue::Set(event_name);
        }
        if let Some(url) = patch.url {
            model.url = ActiveValue::Set(url);
        }
        if let Some(is_active) = patch.is_active {
            model.is_active = ActiveValue::Set(is_active);
        }

        let updated = model.update(self.db.as_ref()).await.map_err(to_store_err)?;
        Ok(model_to_subscription(updated))
    }

    async fn delete(&self, subscription_id: &str) -> Result<bool, RegistryError> {
        let result = subscription::Entity::delete_by_id(subscription_id.to_string())
            .exec(self.db.as_ref())
            .await
            .map_err(to_store_err)?;

        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm_migration::MigratorTrait;

    async fn setup() -> (SeaOrmSubscriptionStore, Arc<DatabaseConnection>) {
        let db = Arc::new(
            sea_orm::Database::connect("sqlite::memory:")
                .await
                .expect("connect"),
        );
        crate::migrations::Migrator::up(db.as_ref(), None)
            .await
            .expect("migrate");
        let store = SeaOrmSubscriptionStore::new(Arc::clone(&db));
        (store, db)
    }

    fn new_sub(event: &str, active: bool) -> NewSubscription {
        NewSubscription {
            name: format!("{event} hook"),
            event_name: event.into(),
            url: "https://x.test/hook".into(),
            is_active: active,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (store, _db) = setup().await;
        let sub = store.create(new_sub("LEAD_CREATED", true)).await.unwrap();
        let loaded = store.get(&sub.id).await.unwrap().unwrap();
        assert_eq!(loaded, sub);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_active() {
        let (store, _db) = setup().await;
        let a = store.create(new_sub("LEAD_CREATED", true)).await.unwrap();
        store.create(new_sub("LEAD_CREATED", false)).await.unwrap();
        store.create(new_sub("INVOICE_CREATED", true)).await.unwrap();

        let found = store.find_active("LEAD_CREATED").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, a.id);

        // Reads without writes in between see the same set.
        let again = store.find_active("LEAD_CREATED").await.unwrap();
        assert_eq!(found, again);
    }

    #[tokio::test]
    async fn test_record_stats() {
        let (store, _db) = setup().await;
        let sub = store.create(new_sub("LEAD_CREATED", true)).await.unwrap();

        store.record_success(&sub.id).await.unwrap();
        store.record_success(&sub.id).await.unwrap();
        store.record_failure(&sub.id).await.unwrap();

        let sub = store.get(&sub.id).await.unwrap().unwrap();
        assert_eq!(sub.total_calls, 3);
        assert_eq!(sub.success_count, 2);
        assert_eq!(sub.failure_count, 1);
        assert!(sub.last_triggered.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let (store, _db) = setup().await;
        let store = Arc::new(store);
        let sub = store.create(new_sub("LEAD_CREATED", true)).await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..20 {
            let store = Arc::clone(&store);
            let id = sub.id.clone();
            tasks.push(tokio::spawn(async move {
                if i % 4 == 0 {
                    store.record_failure(&id).await.unwrap();
                } else {
                    store.record_success(&id).await.unwrap();
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        let sub = store.get(&sub.id).await.unwrap().unwrap();
        assert_eq!(sub.total_calls, 20);
        assert_eq!(sub.failure_count, 5);
        assert_eq!(sub.success_count + sub.failure_count, sub.total_calls);
    }

    #[tokio::test]
    async fn test_record_unknown_subscription() {
        let (store, _db) = setup().await;
        assert!(matches!(
            store.record_success("missing").await,
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_keeps_stats() {
        let (store, _db) = setup().await;
        let sub = store.create(new_sub("LEAD_CREATED", true)).await.unwrap();
        store.record_success(&sub.id).await.unwrap();

        let updated = store
            .update(
                &sub.id,
                SubscriptionPatch {
                    url: Some("https://y.test/hook".into()),
                    is_active: Some(false),
                    ..SubscriptionPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.url, "https://y.test/hook");
        assert!(!updated.is_active);
        assert_eq!(updated.total_calls, 1);
        assert_eq!(updated.success_count, 1);
        assert!(store.find_active("LEAD_CREATED").await.unwrap().is_empty());

        assert!(matches!(
            store.update("missing", SubscriptionPatch::default()).await,
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _db) = setup().await;
        let sub = store.create(new_sub("LEAD_CREATED", true)).await.unwrap();
        assert!(store.delete(&sub.id).await.unwrap());
        assert!(!store.delete(&sub.id).await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }
}
