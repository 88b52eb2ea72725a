mod seaorm_automation_store;
mod seaorm_execution_store;
mod seaorm_subscription_store;

pub use seaorm_automation_store::SeaOrmAutomationStore;
pub use seaorm_execution_store::SeaOrmExecutionStore;
pub use seaorm_subscription_store::SeaOrmSubscriptionStore;
