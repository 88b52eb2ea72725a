//! Engine builder and runtime, the single entry point for dispatching.
//!
//! ```rust,ignore
//! let engine = Engine::builder()
//!     .subscriptions(SeaOrmSubscriptionStore::new(db.clone()))
//!     .config(DispatchConfig::from_env()?)
//!     .build()?;
//!
//! // On the write path, after the row is committed:
//! engine.spawn_dispatch(PayloadBuilder::build(&EntityChange::Created(lead)));
//! ```

mod builder;
pub mod error;

pub use builder::EngineBuilder;
pub use error::EngineError;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::automation::{AutomationMatcher, ExecutionRunner};
use crate::config::{DispatchConfig, ExecutionMode};
use crate::delivery::{DeliveryEngine, DeliveryReport};
use crate::errors::{ConfigError, ExecutionStoreError};
use crate::payload::{EntityChange, EntityRecord, PayloadBuilder};
use crate::traits::{AutomationStore, ExecutionStore, QueueProvider, SubscriptionStore};
use crate::types::{Event, ExecutionRecord};
use crate::worker::ExecutionWorker;

/// Everything one dispatch did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub delivery: DeliveryReport,
    /// Executions created for matched automations. In inline mode these are
    /// the terminal records.
    pub executions: Vec<ExecutionRecord>,
}

/// The assembled dispatch runtime.
///
/// Webhook delivery and automation matching run side by side for every
/// event. Neither can fail the call: all downstream errors are logged and
/// reflected in the returned [`DispatchReport`].
///
/// The engine is cheap to clone; all internals are `Arc`-wrapped.
#[derive(Clone)]
pub struct Engine {
    pub(super) config: Arc<DispatchConfig>,
    pub(super) subscriptions: Arc<dyn SubscriptionStore>,
    pub(super) automations: Arc<dyn AutomationStore>,
    pub(super) executions: Arc<dyn ExecutionStore>,
    pub(super) queue: Arc<dyn QueueProvider>,
    pub(super) delivery: Arc<DeliveryEngine>,
    pub(super) matcher: Arc<AutomationMatcher>,
    pub(super) runner: Arc<ExecutionRunner>,
}

impl Engine {
    /// Create a new [`EngineBuilder`].
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Deliver `event` to its subscribers and start matching automations.
    pub async fn dispatch(&self, event: &Event) -> DispatchReport {
        tracing::debug!(
            event_name = %event.event_name,
            entity_table = %event.entity_table,
            entity_id = %event.entity_id,
            "dispatching event"
        );
        let (delivery, executions) =
            tokio::join!(self.delivery.dispatch(event), self.start_automations(event));
        DispatchReport {
            delivery,
            executions,
        }
    }

    /// Build the event for a typed entity change and dispatch it.
    pub async fn dispatch_change<T: EntityRecord>(&self, change: &EntityChange<T>) -> DispatchReport {
        self.dispatch(&PayloadBuilder::build(change)).await
    }

    /// Dispatch on a background task. The caller's write path never waits
    /// on webhook endpoints; the handle is only for callers that want the
    /// report.
    pub fn spawn_dispatch(&self, event: Event) -> JoinHandle<DispatchReport> {
        let engine = self.clone();
        tokio::spawn(async move { engine.dispatch(&event).await })
    }

    async fn start_automations(&self, event: &Event) -> Vec<ExecutionRecord> {
        match self.config.execution_mode {
            ExecutionMode::Queued => self.matcher.dispatch(event).await,
            ExecutionMode::Inline => {
                let created = self.matcher.create_executions(event).await;
                let mut finished = Vec::with_capacity(created.len());
                for record in created {
                    match self.runner.run(&record.id).await {
                        Ok(Some(done)) => finished.push(done),
                        Ok(None) => finished.push(record),
                        Err(e) => {
                            tracing::error!(
                                execution_id = %record.id,
                                error = %e,
                                "inline execution failed"
                            );
                            finished.push(record);
                        }
                    }
                }
                finished
            }
        }
    }

    /// A worker bound to this engine's queue, runner, and topic.
    pub fn worker(&self) -> ExecutionWorker {
        ExecutionWorker::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.runner),
            self.config.notification_topic.clone(),
        )
    }

    /// Run one execution directly, bypassing the queue.
    pub async fn run_execution(
        &self,
        execution_id: &str,
    ) -> Result<Option<ExecutionRecord>, EngineError> {
        Ok(self.runner.run(execution_id).await?)
    }

    /// Republish notifications for executions still `pending` after the
    /// visibility timeout. Returns the number republished.
    ///
    /// Safe to call repeatedly: a record is only ever claimed once, so a
    /// notification that was merely slow turns into a no-op duplicate.
    pub async fn requeue_stale_pending(&self) -> Result<usize, EngineError> {
        let cutoff = cutoff_for(
            self.config.pending_visibility_timeout,
            "pending_visibility_timeout",
        )?;
        let stale = self.executions.list_pending_before(cutoff).await?;

        let mut requeued = 0;
        for record in &stale {
            match self.matcher.notify(record).await {
                Ok(()) => requeued += 1,
                Err(e) => tracing::warn!(
                    execution_id = %record.id,
                    error = %e,
                    "failed to requeue pending execution"
                ),
            }
        }
        if requeued > 0 {
            tracing::info!(count = requeued, "requeued stale pending executions");
        }
        Ok(requeued)
    }

    /// Fail executions still `running` after the running timeout. Their
    /// worker died or lost the store before a terminal write. Returns the
    /// number failed.
    pub async fn fail_abandoned_running(&self) -> Result<usize, EngineError> {
        let cutoff = cutoff_for(self.config.running_timeout, "running_timeout")?;
        let stuck = self.executions.list_running_before(cutoff).await?;

        let message = format!(
            "execution abandoned: still running after {}s",
            self.config.running_timeout.as_secs()
        );
        let mut failed = 0;
        for record in &stuck {
            match self.executions.fail(&record.id, &message).await {
                Ok(_) => failed += 1,
                // Finished between the listing and the write.
                Err(ExecutionStoreError::InvalidTransition { .. }) => {}
                Err(e) => tracing::warn!(
                    execution_id = %record.id,
                    error = %e,
                    "failed to close abandoned execution"
                ),
            }
        }
        if failed > 0 {
            tracing::warn!(count = failed, "failed abandoned running executions");
        }
        Ok(failed)
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Access the subscription registry (for admin callers).
    pub fn subscriptions(&self) -> &Arc<dyn SubscriptionStore> {
        &self.subscriptions
    }

    /// Access the automation store (for admin callers).
    pub fn automations(&self) -> &Arc<dyn AutomationStore> {
        &self.automations
    }

    /// Access the execution store (run history).
    pub fn executions(&self) -> &Arc<dyn ExecutionStore> {
        &self.executions
    }
}

fn cutoff_for(age: std::time::Duration, key: &str) -> Result<DateTime<Utc>, ConfigError> {
    let age = chrono::Duration::from_std(age).map_err(|e| ConfigError::Invalid {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    Ok(Utc::now() - age)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::InMemoryQueue;
    use crate::payload::Lead;
    use crate::types::{AutomationStatus, ExecutionStatus, NewAutomation, NewSubscription};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::broadcast;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lead(name: &str) -> Lead {
        Lead {
            id: "lead-1".into(),
            name: name.into(),
            email: Some("jane@x.com".into()),
            phone: None,
            company: None,
            source: Some("web".into()),
            status: "new".into(),
            assigned_to: None,
            value: Some(1200.0),
            notes: None,
            created_at: Utc::now(),
        }
    }

    async fn seed(engine: &Engine, server: &MockServer) {
        engine
            .subscriptions()
            .create(NewSubscription {
                name: "crm".into(),
                event_name: "LEAD_CREATED".into(),
                url: format!("{}/hook", server.uri()),
                is_active: true,
            })
            .await
            .unwrap();
        engine
            .automations()
            .create(NewAutomation {
                name: "notify sales".into(),
                status: AutomationStatus::Active,
                workflow_nodes: json!([
                    {"type": "trigger", "event_name": "LEAD_CREATED"},
                    {"type": "action", "action_type": "webhook", "webhook_config": {
                        "url": format!("{}/automation", server.uri()),
                        "body": {"text": "New lead {{name}}"}
                    }}
                ]),
            })
            .await
            .unwrap();
    }

    async fn wait_for_status(engine: &Engine, id: &str, status: ExecutionStatus) -> ExecutionRecord {
        for _ in 0..100 {
            if let Some(record) = engine.executions().get(id).await.unwrap() {
                if record.status == status {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("execution {id} never reached {status}");
    }

    #[tokio::test]
    async fn queued_dispatch_delivers_and_worker_runs_automation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(json!({"trigger_event": "LEAD_CREATED", "name": "Jane"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/automation"))
            .and(body_partial_json(json!({"text": "New lead Jane"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let engine = Engine::builder().build().unwrap();
        seed(&engine, &server).await;

        let (shutdown_tx, _) = broadcast::channel(1);
        let handle = engine.worker().start(shutdown_tx.subscribe()).await.unwrap();

        let report = engine
            .dispatch_change(&EntityChange::Created(lead("Jane")))
            .await;
        assert_eq!(report.delivery.succeeded(), 1);
        assert_eq!(report.executions.len(), 1);
        assert_eq!(report.executions[0].status, ExecutionStatus::Pending);

        let done = wait_for_status(&engine, &report.executions[0].id, ExecutionStatus::Completed).await;
        assert_eq!(done.steps_completed, 1);

        let _ = shutdown_tx.send(());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn inline_mode_runs_automation_before_returning() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let engine = Engine::builder()
            .config(DispatchConfig {
                execution_mode: ExecutionMode::Inline,
                ..DispatchConfig::default()
            })
            .build()
            .unwrap();
        seed(&engine, &server).await;

        let report = engine
            .dispatch_change(&EntityChange::Created(lead("Jane")))
            .await;
        assert_eq!(report.executions.len(), 1);
        assert_eq!(report.executions[0].status, ExecutionStatus::Completed);

        let automations = engine.automations().list().await.unwrap();
        assert_eq!(automations[0].total_runs, 1);
    }

    #[tokio::test]
    async fn failing_endpoints_never_fail_dispatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let engine = Engine::builder()
            .config(DispatchConfig {
                execution_mode: ExecutionMode::Inline,
                ..DispatchConfig::default()
            })
            .build()
            .unwrap();
        seed(&engine, &server).await;

        let report = engine
            .spawn_dispatch(PayloadBuilder::build(&EntityChange::Created(lead("Jane"))))
            .await
            .unwrap();
        assert_eq!(report.delivery.failed(), 1);
        assert_eq!(report.executions[0].status, ExecutionStatus::Failed);

        let subs = engine.subscriptions().list().await.unwrap();
        assert_eq!(subs[0].total_calls, 1);
        assert_eq!(subs[0].failure_count, 1);
    }

    #[tokio::test]
    async fn stale_pending_executions_are_requeued_once_run() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/automation"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let queue = Arc::new(InMemoryQueue::new());
        let engine = Engine::builder()
            .shared_queue(queue.clone())
            .config(DispatchConfig {
                pending_visibility_timeout: Duration::ZERO,
                ..DispatchConfig::default()
            })
            .build()
            .unwrap();
        seed(&engine, &server).await;

        let report = engine
            .dispatch_change(&EntityChange::Created(lead("Jane")))
            .await;
        let execution_id = report.executions[0].id.clone();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(engine.requeue_stale_pending().await.unwrap(), 1);
        assert_eq!(queue.backlog_len("workflow_execution").await, 2);

        let (shutdown_tx, _) = broadcast::channel(1);
        let handle = engine.worker().start(shutdown_tx.subscribe()).await.unwrap();
        wait_for_status(&engine, &execution_id, ExecutionStatus::Completed).await;
        for _ in 0..100 {
            if queue.in_flight_len().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(engine.requeue_stale_pending().await.unwrap(), 0);
        let _ = shutdown_tx.send(());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn abandoned_running_executions_are_failed() {
        let engine = Engine::builder()
            .config(DispatchConfig {
                running_timeout: Duration::ZERO,
                ..DispatchConfig::default()
            })
            .build()
            .unwrap();

        let stuck = ExecutionRecord::pending("a-1", "LEAD_CREATED", json!({}), 2);
        let waiting = ExecutionRecord::pending("a-1", "LEAD_CREATED", json!({}), 2);
        engine.executions().create(&stuck).await.unwrap();
        engine.executions().create(&waiting).await.unwrap();
        // A worker claimed it and went away.
        engine.executions().claim(&stuck.id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(engine.fail_abandoned_running().await.unwrap(), 1);
        let closed = engine.executions().get(&stuck.id).await.unwrap().unwrap();
        assert_eq!(closed.status, ExecutionStatus::Failed);
        assert_eq!(
            closed.error_message.as_deref(),
            Some("execution abandoned: still running after 0s")
        );
        let untouched = engine.executions().get(&waiting.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, ExecutionStatus::Pending);

        assert_eq!(engine.fail_abandoned_running().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn zero_concurrency_is_rejected_at_build() {
        let result = Engine::builder()
            .config(DispatchConfig {
                max_concurrent_deliveries: 0,
                ..DispatchConfig::default()
            })
            .build();
        assert!(matches!(result, Err(EngineError::Build { .. })));
    }
}
