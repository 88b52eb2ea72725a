use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WorkflowExecutions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WorkflowExecutions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WorkflowExecutions::AutomationId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WorkflowExecutions::TriggerType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WorkflowExecutions::TriggerData)
                            .json()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WorkflowExecutions::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(WorkflowExecutions::TotalSteps)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(WorkflowExecutions::StepsCompleted)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(WorkflowExecutions::ErrorMessage).text())
                    .col(
                        ColumnDef::new(WorkflowExecutions::StartedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(WorkflowExecutions::CompletedAt).timestamp())
                    .to_owned(),
            )
            .await?;

        // Requeue sweep: pending records older than a cutoff.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_workflow_executions_status_started")
                    .table(WorkflowExecutions::Table)
                    .col(WorkflowExecutions::Status)
                    .col(WorkflowExecutions::StartedAt)
                    .to_owned(),
            )
            .await?;

        // Run history per automation.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_workflow_executions_automation_started")
                    .table(WorkflowExecutions::Table)
                    .col(WorkflowExecutions::AutomationId)
                    .col(WorkflowExecutions::StartedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WorkflowExecutions::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum WorkflowExecutions {
    Table,
    Id,
    AutomationId,
    TriggerType,
    TriggerData,
    Status,
    TotalSteps,
    StepsCompleted,
    ErrorMessage,
    StartedAt,
    CompletedAt,
}
