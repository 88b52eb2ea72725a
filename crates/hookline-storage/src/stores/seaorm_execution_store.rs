//! SeaORM-backed execution store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{ActiveValue, DatabaseConnection, QueryOrder, QuerySelect};
use std::sync::Arc;

use crate::models::workflow_execution;

use hookline_engine::errors::ExecutionStoreError;
use hookline_engine::traits::ExecutionStore;
use hookline_engine::types::{ExecutionRecord, ExecutionStatus};

/// Database-backed store for workflow execution records.
///
/// Every transition is one `UPDATE ... WHERE id = ? AND status = ?`; zero
/// affected rows means the record moved on (or never existed), which is
/// reported as [`ExecutionStoreError::InvalidTransition`] or
/// [`ExecutionStoreError::NotFound`].
pub struct SeaOrmExecutionStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmExecutionStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find(
        &self,
        execution_id: &str,
    ) -> Result<Option<workflow_execution::Model>, ExecutionStoreError> {
        workflow_execution::Entity::find_by_id(execution_id.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(to_store_err)
    }

    async fn transition(
        &self,
        execution_id: &str,
        expected: ExecutionStatus,
        changes: Vec<(workflow_execution::Column, SimpleExpr)>,
    ) -> Result<ExecutionRecord, ExecutionStoreError> {
        let mut update = workflow_execution::Entity::update_many();
        for (col, expr) in changes {
            update = update.col_expr(col, expr);
        }
        let result = update
            .filter(workflow_execution::Column::Id.eq(execution_id))
            .filter(workflow_execution::Column::Status.eq(expected.as_str()))
            .exec(self.db.as_ref())
            .await
            .map_err(to_store_err)?;

        let current = self
            .find(execution_id)
            .await?
            .ok_or_else(|| ExecutionStoreError::NotFound {
                id: execution_id.to_string(),
            })?;

        if result.rows_affected == 0 {
            return Err(ExecutionStoreError::InvalidTransition {
                id: execution_id.to_string(),
                expected: expected.to_string(),
                actual: current.status,
            });
        }
        model_to_record(current)
    }
}

fn to_store_err(e: impl std::fmt::Display) -> ExecutionStoreError {
    ExecutionStoreError::Store {
        message: e.to_string(),
    }
}

fn status_expr(status: ExecutionStatus) -> SimpleExpr {
    Expr::value(status.as_str())
}

fn model_to_record(m: workflow_execution::Model) -> Result<ExecutionRecord, ExecutionStoreError> {
    let status: ExecutionStatus = m.status.parse().map_err(to_store_err)?;
    Ok(ExecutionRecord {
        id: m.id,
        automation_id: m.automation_id,
        trigger_type: m.trigger_type,
        trigger_data: m.trigger_data,
        status,
        total_steps: m.total_steps.max(0) as u32,
        steps_completed: m.steps_completed.max(0) as u32,
        error_message: m.error_message,
        started_at: m.started_at.and_utc(),
        completed_at: m.completed_at.map(|t| t.and_utc()),
    })
}

#[async_trait]
impl ExecutionStore for SeaOrmExecutionStore {
    async fn create(&self, record: &ExecutionRecord) -> Result<(), ExecutionStoreError> {
        let model = workflow_execution::ActiveModel {
            id: ActiveValue::Set(record.id.clone()),
            automation_id: ActiveValue::Set(record.automation_id.clone()),
            trigger_type: ActiveValue::Set(record.trigger_type.clone()),
            trigger_data: ActiveValue::Set(record.trigger_data.clone()),
            status: ActiveValue::Set(record.status.as_str().to_string()),
            total_steps: ActiveValue::Set(record.total_steps as i32),
            steps_completed: ActiveValue::Set(record.steps_completed as i32),
            error_message: ActiveValue::Set(record.error_message.clone()),
            started_at: ActiveValue::Set(record.started_at.naive_utc()),
            completed_at: ActiveValue::Set(record.completed_at.map(|t| t.naive_utc())),
        };

        workflow_execution::Entity::insert(model)
            .exec(self.db.as_ref())
            .await
            .map_err(to_store_err)?;
        Ok(())
    }

    async fn get(&self, execution_id: &str) -> Result<Option<ExecutionRecord>, ExecutionStoreError> {
        self.find(execution_id)
            .await?
            .map(model_to_record)
            .transpose()
    }

    async fn claim(&self, execution_id: &str) -> Result<ExecutionRecord, ExecutionStoreError> {
        self.transition(
            execution_id,
            ExecutionStatus::Pending,
            vec![(
                workflow_execution::Column::Status,
                status_expr(ExecutionStatus::Running),
            )],
        )
        .await
    }

    async fn record_step(&self, execution_id: &str) -> Result<u32, ExecutionStoreError> {
        let record = self
            .transition(
                execution_id,
                ExecutionStatus::Running,
                vec![(
                    workflow_execution::Column::StepsCompleted,
                    Expr::col(workflow_execution::Column::StepsCompleted).add(1),
                )],
            )
            .await?;
        Ok(record.steps_completed)
    }

    async fn complete(&self, execution_id: &str) -> Result<ExecutionRecord, ExecutionStoreError> {
        let now = Utc::now().naive_utc();
        self.transition(
            execution_id,
            ExecutionStatus::Running,
            vec![
                (
                    workflow_execution::Column::Status,
                    status_expr(ExecutionStatus::Completed),
                ),
                (workflow_execution::Column::CompletedAt, Expr::value(now)),
            ],
        )
        .await
    }

    async fn fail(
        &self,
        execution_id: &str,
        error_message: &str,
    ) -> Result<ExecutionRecord, ExecutionStoreError> {
        let now = Utc::now().naive_utc();
        self.transition(
            execution_id,
            ExecutionStatus::Running,
            vec![
                (
                    workflow_execution::Column::Status,
                    status_expr(ExecutionStatus::Failed),
                ),
                (
                    workflow_execution::Column::ErrorMessage,
                    Expr::value(error_message.to_string()),
                ),
                (workflow_execution::Column::CompletedAt, Expr::value(now)),
            ],
        )
        .await
    }

    async fn list_pending_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ExecutionRecord>, ExecutionStoreError> {
        let models = workflow_execution::Entity::find()
            .filter(workflow_execution::Column::Status.eq(ExecutionStatus::Pending.as_str()))
            .filter(workflow_execution::Column::StartedAt.lt(cutoff.naive_utc()))
            .order_by_asc(workflow_execution::Column::StartedAt)
            .all(self.db.as_ref())
            .await
            .map_err(to_store_err)?;

        models.into_iter().map(model_to_record).collect()
    }

    async fn list_running_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ExecutionRecord>, ExecutionStoreError> {
        let models = workflow_execution::Entity::find()
            .filter(workflow_execution::Column::Status.eq(ExecutionStatus::Running.as_str()))
            .filter(workflow_execution::Column::StartedAt.lt(cutoff.naive_utc()))
            .order_by_asc(workflow_execution::Column::StartedAt)
            .all(self.db.as_ref())
            .await
            .map_err(to_store_err)?;

        models.into_iter().map(model_to_record).collect()
    }

    async fn list_for_automation(
        &self,
        automation_id: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>, ExecutionStoreError> {
        let models = workflow_execution::Entity::find()
            .filter(workflow_execution::Column::AutomationId.eq(automation_id))
            .order_by_desc(workflow_execution::Column::StartedAt)
            .limit(limit as u64)
            .all(self.db.as_ref())
            .await
            .map_err(to_store_err)?;

        models.into_iter().map(model_to_record).collect()
    }
}
