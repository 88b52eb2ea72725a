//! Core data model: events, subscriptions, automations, executions.

mod automation;
mod event;
mod execution;
mod subscription;

pub use automation::{
    ActionNode, AutomationDefinition, AutomationStatus, NewAutomation, WebhookConfig,
    WorkflowNode, WEBHOOK_ACTION,
};
pub use event::{ChangeKind, Event, DELETED_AT_KEY, PREVIOUS_KEY, TRIGGER_EVENT_KEY};
pub use execution::{ExecutionNotification, ExecutionRecord, ExecutionStatus};
pub use subscription::{NewSubscription, Subscription, SubscriptionPatch};
