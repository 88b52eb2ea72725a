//! Domain change events, the unit of dispatch.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key carrying the event name on the wire. Always the first payload key.
pub const TRIGGER_EVENT_KEY: &str = "trigger_event";
/// Key of the nested previous-value object on update/delete payloads.
pub const PREVIOUS_KEY: &str = "previous";
/// Key of the deletion timestamp on delete payloads.
pub const DELETED_AT_KEY: &str = "deleted_at";

/// Payload keys owned by the envelope. Entity columns with these names are
/// not published.
const RESERVED_KEYS: [&str; 3] = [TRIGGER_EVENT_KEY, PREVIOUS_KEY, DELETED_AT_KEY];

/// What happened to the entity row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    /// Suffix used in event names (`LEAD_CREATED`).
    pub fn event_suffix(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Deleted => "DELETED",
        }
    }

    /// Whether payloads of this kind carry a `previous` object.
    pub fn has_previous(&self) -> bool {
        matches!(self, Self::Updated | Self::Deleted)
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// A single domain-entity change, ready for webhook delivery and automation
/// matching.
///
/// Events are transient: they are built by the
/// [`PayloadBuilder`](crate::payload::PayloadBuilder), dispatched, and
/// dropped. `previous_state` is `Some` exactly when `kind` is
/// [`ChangeKind::Updated`] or [`ChangeKind::Deleted`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Event {
    pub event_name: String,
    pub entity_table: String,
    pub entity_id: String,
    pub kind: ChangeKind,
    pub occurred_at: DateTime<Utc>,
    pub current_state: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_state: Option<Map<String, Value>>,
}

impl Event {
    /// The JSON body posted to subscribers and stored as `trigger_data`.
    ///
    /// Layout: `trigger_event` first, then every current field under its own
    /// name, then `previous` (update/delete) and `deleted_at` (delete).
    /// Columns named like an envelope key are dropped, so `previous` and
    /// `deleted_at` only ever appear for the kinds that own them.
    pub fn payload(&self) -> Value {
        let mut body = Map::with_capacity(self.current_state.len() + 3);
        body.insert(
            TRIGGER_EVENT_KEY.to_string(),
            Value::String(self.event_name.clone()),
        );
        for (key, value) in &self.current_state {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            body.insert(key.clone(), value.clone());
        }
        if let Some(previous) = &self.previous_state {
            body.insert(PREVIOUS_KEY.to_string(), Value::Object(previous.clone()));
        }
        if self.kind == ChangeKind::Deleted {
            body.insert(
                DELETED_AT_KEY.to_string(),
                Value::String(self.occurred_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
        }
        Value::Object(body)
    }
}
