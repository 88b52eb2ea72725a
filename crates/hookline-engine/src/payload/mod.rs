//! Event payload construction.
//!
//! One parameterized builder replaces the per-table trigger bodies: each
//! entity declares an [`EventSchema`] (table, event-name prefix, id column,
//! previous-value allowlist) and an explicit field map via [`EntityRecord`].
//! Building is a pure function of its inputs and the supplied clock value.

pub mod entities;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::types::{ChangeKind, Event};

pub use entities::{
    schema_for_table, Appointment, BillingSubscription, Estimate, Expense, Invoice, Lead,
    LeaveRequest, Product, Receipt, SCHEMAS,
};

/// Static description of how one entity type is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSchema {
    pub entity_table: &'static str,
    /// Event-name prefix, e.g. `LEAD` for `LEAD_CREATED`.
    pub event_prefix: &'static str,
    pub id_field: &'static str,
    /// Fields whose old values are published under `previous`.
    pub previous_fields: &'static [&'static str],
}

impl EventSchema {
    /// The fixed event name for this entity and change kind.
    pub fn event_name(&self, kind: ChangeKind) -> String {
        format!("{}_{}", self.event_prefix, kind.event_suffix())
    }
}

/// A typed entity with a compile-time mapping from struct fields to payload
/// keys.
pub trait EntityRecord {
    const SCHEMA: EventSchema;

    /// Every published field, keyed by its column name.
    fn to_fields(&self) -> Map<String, Value>;
}

/// A row change. The variant decides whether old values exist, so an event
/// can never carry `previous` on create or lack it on update/delete.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityChange<T> {
    Created(T),
    Updated { old: T, new: T },
    Deleted(T),
}

impl<T> EntityChange<T> {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Created(_) => ChangeKind::Created,
            Self::Updated { .. } => ChangeKind::Updated,
            Self::Deleted(_) => ChangeKind::Deleted,
        }
    }

    fn map<U>(&self, f: impl Fn(&T) -> U) -> EntityChange<U> {
        match self {
            Self::Created(row) => EntityChange::Created(f(row)),
            Self::Updated { old, new } => EntityChange::Updated {
                old: f(old),
                new: f(new),
            },
            Self::Deleted(row) => EntityChange::Deleted(f(row)),
        }
    }
}

/// Builds [`Event`]s from entity changes.
pub struct PayloadBuilder;

impl PayloadBuilder {
    /// Build an event for a typed entity change, stamped with the current time.
    pub fn build<T: EntityRecord>(change: &EntityChange<T>) -> Event {
        Self::build_at(change, Utc::now())
    }

    /// Build an event for a typed entity change at a fixed time.
    pub fn build_at<T: EntityRecord>(change: &EntityChange<T>, at: DateTime<Utc>) -> Event {
        Self::from_fields(&T::SCHEMA, change.map(T::to_fields), at)
    }

    /// Build an event from raw field maps supplied by the storage layer.
    ///
    /// All fields of the current row are published as given. For deletes the
    /// current row is the row being removed.
    pub fn from_fields(
        schema: &EventSchema,
        change: EntityChange<Map<String, Value>>,
        at: DateTime<Utc>,
    ) -> Event {
        let kind = change.kind();
        let (current, previous) = match change {
            EntityChange::Created(row) => (row, None),
            EntityChange::Updated { old, new } => (new, Some(curate(schema, &old))),
            EntityChange::Deleted(row) => {
                let previous = curate(schema, &row);
                (row, Some(previous))
            }
        };

        Event {
            event_name: schema.event_name(kind),
            entity_table: schema.entity_table.to_string(),
            entity_id: id_text(current.get(schema.id_field)),
            kind,
            occurred_at: at,
            current_state: current,
            previous_state: previous,
        }
    }
}

/// The allowlisted subset of `row`. Allowlisted fields missing from the row
/// are published as `null` so subscribers see a stable shape.
fn curate(schema: &EventSchema, row: &Map<String, Value>) -> Map<String, Value> {
    schema
        .previous_fields
        .iter()
        .map(|field| {
            (
                field.to_string(),
                row.get(*field).cloned().unwrap_or(Value::Null),
            )
        })
        .collect()
}

fn id_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
