pub use sea_orm_migration::prelude::*;

mod m20260301_000001_subscriptions;
mod m20260301_000002_automations;
mod m20260301_000003_workflow_executions;

pub use m20260301_000001_subscriptions::Migration as SubscriptionsMigration;
pub use m20260301_000002_automations::Migration as AutomationsMigration;
pub use m20260301_000003_workflow_executions::Migration as WorkflowExecutionsMigration;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_subscriptions::Migration),
            Box::new(m20260301_000002_automations::Migration),
            Box::new(m20260301_000003_workflow_executions::Migration),
        ]
    }
}
