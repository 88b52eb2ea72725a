use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Automations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Automations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Automations::Name).string().not_null())
                    .col(
                        ColumnDef::new(Automations::Status)
                            .string()
                            .not_null()
                            .default("inactive"),
                    )
                    .col(ColumnDef::new(Automations::WorkflowNodes).json().not_null())
                    .col(
                        ColumnDef::new(Automations::TotalRuns)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Automations::LastRun).timestamp())
                    .col(
                        ColumnDef::new(Automations::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_automations_status")
                    .table(Automations::Table)
                    .col(Automations::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Automations::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Automations {
    Table,
    Id,
    Name,
    Status,
    WorkflowNodes,
    TotalRuns,
    LastRun,
    CreatedAt,
}
