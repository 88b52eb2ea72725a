//! Automation definitions: ordered node graphs with a trigger filter.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Action type handled by the execution runner.
pub const WEBHOOK_ACTION: &str = "webhook";

/// Whether an automation participates in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationStatus {
    Active,
    Inactive,
}

impl AutomationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for AutomationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(format!("unknown automation status: {s}")),
        }
    }
}

/// An administrator-owned workflow: node 0 filters on an event name, nodes
/// `1..` are actions executed in order.
///
/// `workflow_nodes` is kept as raw JSON because definitions are authored
/// out-of-band and may be malformed; [`nodes()`](Self::nodes) parses them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AutomationDefinition {
    pub id: String,
    pub name: String,
    pub status: AutomationStatus,
    pub workflow_nodes: Value,
    #[serde(default)]
    pub total_runs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
}

impl AutomationDefinition {
    pub fn new(new: NewAutomation) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: new.name,
            status: new.status,
            workflow_nodes: new.workflow_nodes,
            total_runs: 0,
            last_run: None,
        }
    }

    /// Parse `workflow_nodes` into typed nodes.
    ///
    /// Accepts a JSON array, or a string containing one (legacy rows stored
    /// the graph as text).
    pub fn nodes(&self) -> Result<Vec<WorkflowNode>, serde_json::Error> {
        match &self.workflow_nodes {
            Value::String(text) => serde_json::from_str(text),
            other => serde_json::from_value(other.clone()),
        }
    }
}

/// Admin input for creating an automation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAutomation {
    pub name: String,
    pub status: AutomationStatus,
    pub workflow_nodes: Value,
}

/// One node of an automation graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowNode {
    Trigger { event_name: String },
    Action(ActionNode),
}

impl WorkflowNode {
    pub fn trigger_event(&self) -> Option<&str> {
        match self {
            Self::Trigger { event_name } => Some(event_name),
            Self::Action(_) => None,
        }
    }
}

/// An action step. Only `action_type == "webhook"` is executable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionNode {
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_config: Option<WebhookConfig>,
}

/// Outbound call configured on a webhook action. Header values and string
/// leaves of `body` may contain `{{field}}` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition(nodes: Value) -> AutomationDefinition {
        AutomationDefinition::new(NewAutomation {
            name: "welcome".into(),
            status: AutomationStatus::Active,
            workflow_nodes: nodes,
        })
    }

    #[test]
    fn parses_trigger_and_webhook_action() {
        let def = definition(json!([
            {"type": "trigger", "event_name": "LEAD_CREATED"},
            {"type": "action", "action_type": "webhook",
             "webhook_config": {"url": "https://x.test", "headers": {"X-Name": "{{name}}"}}}
        ]));
        let nodes = def.nodes().unwrap();
        assert_eq!(nodes[0].trigger_event(), Some("LEAD_CREATED"));
        match &nodes[1] {
            WorkflowNode::Action(action) => {
                assert_eq!(action.action_type, WEBHOOK_ACTION);
                let cfg = action.webhook_config.as_ref().unwrap();
                assert_eq!(cfg.headers["X-Name"], "{{name}}");
                assert!(cfg.body.is_none());
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn parses_graph_stored_as_text() {
        let def = definition(json!(
            r#"[{"type":"trigger","event_name":"LEAD_CREATED"}]"#
        ));
        assert_eq!(def.nodes().unwrap().len(), 1);
    }

    #[test]
    fn garbled_graph_is_an_error() {
        assert!(definition(json!({"nodes": "nope"})).nodes().is_err());
        assert!(definition(json!("not json")).nodes().is_err());
        assert!(definition(json!([{"type": "mystery"}])).nodes().is_err());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(
            "Active".parse::<AutomationStatus>().unwrap(),
            AutomationStatus::Active
        );
        assert!("paused".parse::<AutomationStatus>().is_err());
    }
}
