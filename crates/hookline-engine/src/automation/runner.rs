//! Execution runner: performs the action nodes of one automation run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use super::template::{render_str, render_value};
use crate::errors::{ActionError, DeliveryError, ExecutionStoreError};
use crate::traits::{AutomationStore, ExecutionStore, WebhookTransport};
use crate::types::{ExecutionRecord, WorkflowNode, WEBHOOK_ACTION};

/// Runs claimed executions to a terminal state.
///
/// Actions run in order. The first failing action marks the execution
/// `failed` and the rest are skipped; other executions are unaffected.
pub struct ExecutionRunner {
    automations: Arc<dyn AutomationStore>,
    executions: Arc<dyn ExecutionStore>,
    transport: Arc<dyn WebhookTransport>,
    timeout: Duration,
}

impl ExecutionRunner {
    pub fn new(
        automations: Arc<dyn AutomationStore>,
        executions: Arc<dyn ExecutionStore>,
        transport: Arc<dyn WebhookTransport>,
        timeout: Duration,
    ) -> Self {
        Self {
            automations,
            executions,
            transport,
            timeout,
        }
    }

    /// Claim and run `execution_id`.
    ///
    /// Returns `Ok(None)` when the record is missing or no longer `pending`
    /// (a duplicate notification). Otherwise returns the terminal record.
    /// Only execution-store failures are returned as errors; action failures
    /// end up in the record.
    pub async fn run(
        &self,
        execution_id: &str,
    ) -> Result<Option<ExecutionRecord>, ExecutionStoreError> {
        let record = match self.executions.claim(execution_id).await {
            Ok(record) => record,
            Err(ExecutionStoreError::InvalidTransition { actual, .. }) => {
                tracing::debug!(
                    execution_id = %execution_id,
                    status = %actual,
                    "execution already claimed, skipping"
                );
                return Ok(None);
            }
            Err(ExecutionStoreError::NotFound { .. }) => {
                tracing::warn!(execution_id = %execution_id, "execution not found, skipping");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        tracing::debug!(execution_id = %execution_id, "execution running");

        let nodes = match self.load_nodes(&record).await {
            Ok(nodes) => nodes,
            Err(message) => return self.fail(&record, &message).await.map(Some),
        };

        for (index, node) in nodes.iter().enumerate().skip(1) {
            if let Err(e) = self.perform(index, node, &record.trigger_data).await {
                return self.fail(&record, &e.to_string()).await.map(Some);
            }
            if let Err(e) = self.executions.record_step(&record.id).await {
                return Err(self.abandon(&record, e).await);
            }
        }

        let done = match self.executions.complete(&record.id).await {
            Ok(done) => done,
            Err(e) => return Err(self.abandon(&record, e).await),
        };
        if let Err(e) = self.automations.record_run(&record.automation_id).await {
            tracing::warn!(
                automation_id = %record.automation_id,
                error = %e,
                "failed to record automation run"
            );
        }
        tracing::info!(
            execution_id = %done.id,
            automation_id = %done.automation_id,
            steps = done.steps_completed,
            "execution completed"
        );
        Ok(Some(done))
    }

    async fn load_nodes(&self, record: &ExecutionRecord) -> Result<Vec<WorkflowNode>, String> {
        let automation = match self.automations.get(&record.automation_id).await {
            Ok(Some(a)) => a,
            Ok(None) => return Err(format!("automation not found: {}", record.automation_id)),
            Err(e) => return Err(e.to_string()),
        };
        let nodes = automation
            .nodes()
            .map_err(|e| format!("malformed workflow_nodes: {e}"))?;

        // The step count was fixed when the event matched; an edited graph
        // would run steps the record never accounted for.
        let steps = nodes.len().saturating_sub(1);
        if steps != record.total_steps as usize {
            return Err(format!(
                "workflow changed since trigger: expected {} steps, found {steps}",
                record.total_steps
            ));
        }
        Ok(nodes)
    }

    /// A store write failed after the claim. Close the record as `failed`
    /// if the store allows it; otherwise it stays `running` until
    /// [`Engine::fail_abandoned_running`](crate::Engine::fail_abandoned_running)
    /// picks it up. The original error is returned either way.
    async fn abandon(
        &self,
        record: &ExecutionRecord,
        err: ExecutionStoreError,
    ) -> ExecutionStoreError {
        match self.executions.fail(&record.id, &err.to_string()).await {
            Ok(_) => tracing::warn!(
                execution_id = %record.id,
                error = %err,
                "execution failed after store error"
            ),
            Err(e) => tracing::error!(
                execution_id = %record.id,
                error = %e,
                cause = %err,
                "could not mark execution failed, left running"
            ),
        }
        err
    }

    async fn fail(
        &self,
        record: &ExecutionRecord,
        message: &str,
    ) -> Result<ExecutionRecord, ExecutionStoreError> {
        tracing::warn!(
            execution_id = %record.id,
            automation_id = %record.automation_id,
            error = %message,
            "execution failed"
        );
        self.executions.fail(&record.id, message).await
    }

    async fn perform(
        &self,
        index: usize,
        node: &WorkflowNode,
        trigger_data: &Value,
    ) -> Result<(), ActionError> {
        let action = match node {
            WorkflowNode::Action(action) => action,
            WorkflowNode::Trigger { .. } => return Err(ActionError::UnexpectedTrigger { index }),
        };
        if action.action_type != WEBHOOK_ACTION {
            return Err(ActionError::UnsupportedAction {
                action_type: action.action_type.clone(),
            });
        }
        let config = action
            .webhook_config
            .as_ref()
            .ok_or(ActionError::MissingWebhookConfig { index })?;

        let headers: Vec<(String, String)> = config
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), render_str(v, trigger_data)))
            .collect();
        let body = match &config.body {
            Some(template) => render_value(template, trigger_data),
            None => trigger_data.clone(),
        };

        let started = Instant::now();
        match tokio::time::timeout(
            self.timeout,
            self.transport.post_json(&config.url, &headers, &body),
        )
        .await
        {
            Ok(result) => result.map_err(ActionError::from),
            Err(_) => Err(DeliveryError::Timeout {
                elapsed_ms: started.elapsed().as_millis() as u64,
            }
            .into()),
        }
    }
}
