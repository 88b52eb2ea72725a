//! SeaORM-backed automation store.

use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveValue, DatabaseConnection, QueryOrder};
use std::sync::Arc;

use crate::models::automation;

use hookline_engine::errors::AutomationStoreError;
use hookline_engine::traits::AutomationStore;
use hookline_engine::types::{AutomationDefinition, AutomationStatus, NewAutomation};

/// Database-backed store for automation definitions.
pub struct SeaOrmAutomationStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmAutomationStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn update_one(
        &self,
        automation_id: &str,
        update: sea_orm::UpdateMany<automation::Entity>,
    ) -> Result<(), AutomationStoreError> {
        let result = update
            .filter(automation::Column::Id.eq(automation_id))
            .exec(self.db.as_ref())
            .await
            .map_err(to_store_err)?;

        if result.rows_affected == 0 {
            return Err(AutomationStoreError::NotFound {
                id: automation_id.to_string(),
            });
        }
        Ok(())
    }
}

fn to_store_err(e: impl std::fmt::Display) -> AutomationStoreError {
    AutomationStoreError::Store {
        message: e.to_string(),
    }
}

fn model_to_definition(m: automation::Model) -> Result<AutomationDefinition, AutomationStoreError> {
    let status: AutomationStatus = m.status.parse().map_err(to_store_err)?;
    Ok(AutomationDefinition {
        id: m.id,
        name: m.name,
        status,
        workflow_nodes: m.workflow_nodes,
        total_runs: m.total_runs.max(0) as u64,
        last_run: m.last_run.map(|t| t.and_utc()),
    })
}

#[async_trait]
impl AutomationStore for SeaOrmAutomationStore {
    async fn create(&self, new: NewAutomation) -> Result<AutomationDefinition, AutomationStoreError> {
        let def = AutomationDefinition::new(new);
        let model = automation::ActiveModel {
            id: ActiveValue::Set(def.id.clone()),
            name: ActiveValue::Set(def.name.clone()),
            status: ActiveValue::Set(def.status.as_str().to_string()),
            workflow_nodes: ActiveValue::Set(def.workflow_nodes.clone()),
            total_runs: ActiveValue::Set(0),
            last_run: ActiveValue::Set(None),
            created_at: ActiveValue::Set(chrono::Utc::now().naive_utc()),
        };

        automation::Entity::insert(model)
            .exec(self.db.as_ref())
            .await
            .map_err(to_store_err)?;

        Ok(def)
    }

    async fn get(
        &self,
        automation_id: &str,
    ) -> Result<Option<AutomationDefinition>, AutomationStoreError> {
        automation::Entity::find_by_id(automation_id.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(to_store_err)?
            .map(model_to_definition)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<AutomationDefinition>, AutomationStoreError> {
        let models = automation::Entity::find()
            .order_by_asc(automation::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(to_store_err)?;

        models.into_iter().map(model_to_definition).collect()
    }

    async fn list_active(&self) -> Result<Vec<AutomationDefinition>, AutomationStoreError> {
        let models = automation::Entity::find()
            .filter(automation::Column::Status.eq(AutomationStatus::Active.as_str()))
            .order_by_asc(automation::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(to_store_err)?;

        models.into_iter().map(model_to_definition).collect()
    }

    async fn set_status(
        &self,
        automation_id: &str,
        status: AutomationStatus,
    ) -> Result<(), AutomationStoreError> {
        self.update_one(
            automation_id,
            automation::Entity::update_many()
                .col_expr(automation::Column::Status, Expr::value(status.as_str())),
        )
        .await
    }

    async fn record_run(&self, automation_id: &str) -> Result<(), AutomationStoreError> {
        let now = chrono::Utc::now().naive_utc();
        self.update_one(
            automation_id,
            automation::Entity::update_many()
                .col_expr(
                    automation::Column::TotalRuns,
                    Expr::col(automation::Column::TotalRuns).add(1),
                )
                .col_expr(automation::Column::LastRun, Expr::value(now)),
        )
        .await
    }
}
