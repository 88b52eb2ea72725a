//! SeaORM storage layer for the hookline dispatch engine.
//!
//! Contains entities, migrations, and store implementations for the three
//! dispatch tables: `subscriptions`, `automations`, and
//! `workflow_executions`.

pub mod migrations;
pub mod models;
pub mod stores;

pub use stores::{SeaOrmAutomationStore, SeaOrmExecutionStore, SeaOrmSubscriptionStore};

use sea_orm::{Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;

/// Connect to a database using the given URL.
pub async fn connect(url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(url).await
}

/// Run the dispatch-table migrations.
pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    migrations::Migrator::up(db, None).await
}
