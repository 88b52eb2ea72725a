//! Execution records and the worker hand-off message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of an automation run.
///
/// `Pending -> Running -> {Completed, Failed}`. Terminal states are never
/// left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("unknown execution status: {s}")),
        }
    }
}

/// Audit record for one automation run triggered by one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutionRecord {
    pub id: String,
    pub automation_id: String,
    /// Event name that matched the trigger node.
    pub trigger_type: String,
    /// The event payload the run was triggered with.
    pub trigger_data: Value,
    pub status: ExecutionStatus,
    pub total_steps: u32,
    pub steps_completed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    /// A fresh `pending` record.
    pub fn pending(
        automation_id: impl Into<String>,
        trigger_type: impl Into<String>,
        trigger_data: Value,
        total_steps: u32,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            automation_id: automation_id.into(),
            trigger_type: trigger_type.into(),
            trigger_data,
            status: ExecutionStatus::Pending,
            total_steps,
            steps_completed: 0,
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn notification(&self) -> ExecutionNotification {
        ExecutionNotification {
            execution_id: self.id.clone(),
            automation_id: self.automation_id.clone(),
            trigger_type: self.trigger_type.clone(),
        }
    }
}

/// Message published on the notification topic for each matched automation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionNotification {
    pub execution_id: String,
    pub automation_id: String,
    pub trigger_type: String,
}
