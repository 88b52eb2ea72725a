//! Error types for every pluggable dispatch seam.

use thiserror::Error;

/// Errors from [`SubscriptionStore`](super::traits::SubscriptionStore).
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("subscription not found: {id}")]
    NotFound { id: String },
    #[error("subscription store error: {message}")]
    Store { message: String },
}

/// Errors from [`AutomationStore`](super::traits::AutomationStore).
#[derive(Debug, Error)]
pub enum AutomationStoreError {
    #[error("automation not found: {id}")]
    NotFound { id: String },
    #[error("automation store error: {message}")]
    Store { message: String },
}

/// Errors from [`ExecutionStore`](super::traits::ExecutionStore).
#[derive(Debug, Error)]
pub enum ExecutionStoreError {
    #[error("execution not found: {id}")]
    NotFound { id: String },
    /// A lifecycle transition was attempted from the wrong state.
    #[error("execution {id} is {actual}, expected {expected}")]
    InvalidTransition {
        id: String,
        expected: String,
        actual: String,
    },
    #[error("execution store error: {message}")]
    Store { message: String },
}

/// Errors from [`QueueProvider`](super::traits::QueueProvider).
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue error: {message}")]
    Queue { message: String },
}

/// Errors from a single outbound webhook call.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("webhook request failed: {message}")]
    Transport { message: String },
    #[error("webhook endpoint returned HTTP {status}")]
    Status { status: u16 },
    #[error("webhook request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
}

/// Errors while reading [`DispatchConfig`](super::config::DispatchConfig)
/// from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Errors from one automation action step. The display text is what gets
/// stored as the execution's `error_message`.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("unsupported action type: {action_type}")]
    UnsupportedAction { action_type: String },
    #[error("unexpected trigger node at position {index}")]
    UnexpectedTrigger { index: usize },
    #[error("webhook action at position {index} has no webhook_config")]
    MissingWebhookConfig { index: usize },
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}
