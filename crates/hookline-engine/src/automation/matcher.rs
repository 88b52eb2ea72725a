//! Automation trigger matching and execution hand-off.

use std::sync::Arc;

use crate::errors::QueueError;
use crate::traits::{AutomationStore, ExecutionStore, QueueProvider};
use crate::types::{AutomationDefinition, AutomationStatus, Event, ExecutionRecord};

/// An automation whose trigger node accepted an event.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedAutomation {
    pub automation: AutomationDefinition,
    /// Always 0: only the first node is a trigger filter.
    pub trigger_node_index: usize,
    /// Number of action nodes after the trigger.
    pub total_steps: u32,
}

/// Scans automation definitions for triggers matching an event and records
/// a `pending` execution for each hit.
///
/// Malformed definitions are skipped with a warning; they never abort the
/// pass for the remaining automations.
pub struct AutomationMatcher {
    automations: Arc<dyn AutomationStore>,
    executions: Arc<dyn ExecutionStore>,
    queue: Arc<dyn QueueProvider>,
    topic: String,
}

impl AutomationMatcher {
    pub fn new(
        automations: Arc<dyn AutomationStore>,
        executions: Arc<dyn ExecutionStore>,
        queue: Arc<dyn QueueProvider>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            automations,
            executions,
            queue,
            topic: topic.into(),
        }
    }

    /// Active automations whose node 0 is a trigger for `event_name`.
    pub async fn find_matches(&self, event_name: &str) -> Vec<MatchedAutomation> {
        let candidates = match self.automations.list_active().await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(event_name = %event_name, error = %e, "failed to load automations");
                return Vec::new();
            }
        };

        candidates
            .into_iter()
            .filter_map(|automation| match_one(automation, event_name))
            .collect()
    }

    /// Match `event` and persist one `pending` [`ExecutionRecord`] per hit.
    ///
    /// Does not publish notifications; see [`dispatch()`](Self::dispatch).
    pub async fn create_executions(&self, event: &Event) -> Vec<ExecutionRecord> {
        let matches = self.find_matches(&event.event_name).await;
        if matches.is_empty() {
            return Vec::new();
        }

        let trigger_data = event.payload();
        let mut records = Vec::with_capacity(matches.len());
        for matched in matches {
            let record = ExecutionRecord::pending(
                &matched.automation.id,
                &event.event_name,
                trigger_data.clone(),
                matched.total_steps,
            );
            match self.executions.create(&record).await {
                Ok(()) => {
                    tracing::debug!(
                        execution_id = %record.id,
                        automation_id = %record.automation_id,
                        "execution created"
                    );
                    records.push(record);
                }
                Err(e) => tracing::warn!(
                    automation_id = %matched.automation.id,
                    error = %e,
                    "failed to create execution record, skipping automation"
                ),
            }
        }
        records
    }

    /// Publish the worker notification for one execution.
    pub async fn notify(&self, record: &ExecutionRecord) -> Result<(), QueueError> {
        let payload =
            serde_json::to_vec(&record.notification()).map_err(|e| QueueError::Queue {
                message: format!("failed to encode notification: {e}"),
            })?;
        self.queue.publish(&self.topic, &payload, None).await
    }

    /// Match, persist, and notify. A failed publish leaves the record
    /// `pending` for the requeue sweep to pick up.
    pub async fn dispatch(&self, event: &Event) -> Vec<ExecutionRecord> {
        let records = self.create_executions(event).await;
        for record in &records {
            if let Err(e) = self.notify(record).await {
                tracing::warn!(
                    execution_id = %record.id,
                    error = %e,
                    "failed to publish execution notification"
                );
            }
        }
        records
    }
}

fn match_one(automation: AutomationDefinition, event_name: &str) -> Option<MatchedAutomation> {
    if automation.status != AutomationStatus::Active {
        return None;
    }

    let nodes = match automation.nodes() {
        Ok(nodes) => nodes,
        Err(e) => {
            tracing::warn!(
                automation_id = %automation.id,
                error = %e,
                "malformed workflow_nodes, skipping automation"
            );
            return None;
        }
    };

    let trigger = nodes.first()?.trigger_event()?;
    if trigger != event_name {
        return None;
    }

    Some(MatchedAutomation {
        total_steps: (nodes.len() - 1) as u32,
        trigger_node_index: 0,
        automation,
    })
}
