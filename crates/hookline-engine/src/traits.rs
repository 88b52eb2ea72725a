//! Plugin trait interfaces for the dispatch engine.
//!
//! Every pluggable component is an async trait. In-memory defaults live in
//! [`crate::defaults`]; the SeaORM implementations live in
//! `hookline-storage`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::errors::*;
use super::types::*;

// ---------------------------------------------------------------------------
// SubscriptionStore
// ---------------------------------------------------------------------------

/// Registry of webhook subscriptions.
///
/// The delivery engine only calls [`find_active()`](Self::find_active),
/// [`record_success()`](Self::record_success), and
/// [`record_failure()`](Self::record_failure). The remaining methods serve
/// admin callers.
///
/// Statistic updates race when bulk writes fire many dispatches for the same
/// subscription. Implementations must apply them as atomic increments on the
/// stored row, never as read-modify-write of a cached copy.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Active subscriptions for `event_name`. Order is unspecified.
    async fn find_active(&self, event_name: &str) -> Result<Vec<Subscription>, RegistryError>;

    /// `total_calls += 1`, `success_count += 1`, `last_triggered = now()`.
    async fn record_success(&self, subscription_id: &str) -> Result<(), RegistryError>;

    /// `total_calls += 1`, `failure_count += 1`, `last_triggered = now()`.
    async fn record_failure(&self, subscription_id: &str) -> Result<(), RegistryError>;

    async fn create(&self, new: NewSubscription) -> Result<Subscription, RegistryError>;

    async fn get(&self, subscription_id: &str) -> Result<Option<Subscription>, RegistryError>;

    async fn list(&self) -> Result<Vec<Subscription>, RegistryError>;

    /// Apply an admin edit. Statistics are never touched.
    async fn update(
        &self,
        subscription_id: &str,
        patch: SubscriptionPatch,
    ) -> Result<Subscription, RegistryError>;

    /// Remove a subscription. Returns `true` if it existed.
    async fn delete(&self, subscription_id: &str) -> Result<bool, RegistryError>;
}

// ---------------------------------------------------------------------------
// AutomationStore
// ---------------------------------------------------------------------------

/// Persistence for automation definitions.
#[async_trait]
pub trait AutomationStore: Send + Sync {
    async fn create(&self, new: NewAutomation) -> Result<AutomationDefinition, AutomationStoreError>;

    async fn get(&self, automation_id: &str)
        -> Result<Option<AutomationDefinition>, AutomationStoreError>;

    async fn list(&self) -> Result<Vec<AutomationDefinition>, AutomationStoreError>;

    /// Automations with `status == Active`. Default: filters [`list()`](Self::list).
    async fn list_active(&self) -> Result<Vec<AutomationDefinition>, AutomationStoreError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|a| a.status == AutomationStatus::Active)
            .collect())
    }

    async fn set_status(
        &self,
        automation_id: &str,
        status: AutomationStatus,
    ) -> Result<(), AutomationStoreError>;

    /// `total_runs += 1`, `last_run = now()`, applied atomically.
    async fn record_run(&self, automation_id: &str) -> Result<(), AutomationStoreError>;
}

// ---------------------------------------------------------------------------
// ExecutionStore
// ---------------------------------------------------------------------------

/// Persistence for execution records.
///
/// Transitions are conditional on the current status so that a record
/// reaches a terminal state at most once, even when the worker receives the
/// same notification twice.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn create(&self, record: &ExecutionRecord) -> Result<(), ExecutionStoreError>;

    async fn get(&self, execution_id: &str) -> Result<Option<ExecutionRecord>, ExecutionStoreError>;

    /// `pending -> running`. Fails with
    /// [`ExecutionStoreError::InvalidTransition`] for any other status.
    async fn claim(&self, execution_id: &str) -> Result<ExecutionRecord, ExecutionStoreError>;

    /// `steps_completed += 1` on a running record. Returns the new count.
    async fn record_step(&self, execution_id: &str) -> Result<u32, ExecutionStoreError>;

    /// `running -> completed`, stamping `completed_at`.
    async fn complete(&self, execution_id: &str) -> Result<ExecutionRecord, ExecutionStoreError>;

    /// `running -> failed`, storing `error_message` and stamping `completed_at`.
    async fn fail(
        &self,
        execution_id: &str,
        error_message: &str,
    ) -> Result<ExecutionRecord, ExecutionStoreError>;

    /// Records still `pending` that were created before `cutoff`.
    async fn list_pending_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ExecutionRecord>, ExecutionStoreError>;

    /// Records still `running` that were created before `cutoff`. These were
    /// claimed by a worker that never reached a terminal write.
    async fn list_running_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ExecutionRecord>, ExecutionStoreError>;

    /// Run history of one automation, newest first.
    async fn list_for_automation(
        &self,
        automation_id: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>, ExecutionStoreError>;
}

// ---------------------------------------------------------------------------
// QueueProvider
// ---------------------------------------------------------------------------

/// Async notification channel between the dispatch path and workers.
///
/// Implementations must preserve at-least-once delivery to a subscribed
/// worker. Messages are acknowledged via [`ack()`](Self::ack) after
/// processing.
#[async_trait]
pub trait QueueProvider: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        headers: Option<&HashMap<String, String>>,
    ) -> Result<(), QueueError>;

    async fn subscribe(&self, topic: &str) -> Result<QueueReceiver, QueueError>;

    async fn ack(&self, receipt: &MessageReceipt) -> Result<(), QueueError>;
}

/// Receiver end of a queue subscription.
pub struct QueueReceiver {
    pub rx: tokio::sync::mpsc::Receiver<QueueMessage>,
}

/// A message received from a queue.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub payload: Vec<u8>,
    pub headers: HashMap<String, String>,
    pub receipt: MessageReceipt,
}

/// Opaque receipt for acknowledging a queue message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageReceipt {
    pub id: String,
}

// ---------------------------------------------------------------------------
// WebhookTransport
// ---------------------------------------------------------------------------

/// Performs one outbound JSON POST.
///
/// `Content-Type: application/json` is always sent; `headers` carries any
/// additional caller-configured headers. [`ReqwestTransport`](crate::ReqwestTransport)
/// also sends `User-Agent` from [`DispatchConfig::user_agent`](crate::DispatchConfig::user_agent);
/// subscribers must not rely on any other header. Any transport error, timeout, or
/// non-2xx status is an `Err`.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
    ) -> Result<(), DeliveryError>;
}
