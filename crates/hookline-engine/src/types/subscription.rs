//! Webhook subscriptions and their delivery statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered `(event_name, url)` pair that receives webhook deliveries.
///
/// Statistics are only mutated by the delivery engine through
/// [`SubscriptionStore::record_success`](crate::traits::SubscriptionStore::record_success)
/// and [`record_failure`](crate::traits::SubscriptionStore::record_failure),
/// which keep `total_calls == success_count + failure_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Subscription {
    pub id: String,
    pub name: String,
    pub event_name: String,
    pub url: String,
    pub is_active: bool,
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_triggered: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Build a fresh subscription with zeroed statistics.
    pub fn new(new: NewSubscription) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: new.name,
            event_name: new.event_name,
            url: new.url,
            is_active: new.is_active,
            total_calls: 0,
            success_count: 0,
            failure_count: 0,
            last_triggered: None,
        }
    }

    /// Apply an admin patch in place.
    pub fn apply(&mut self, patch: SubscriptionPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(event_name) = patch.event_name {
            self.event_name = event_name;
        }
        if let Some(url) = patch.url {
            self.url = url;
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
    }
}

/// Admin input for registering a subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubscription {
    pub name: String,
    pub event_name: String,
    pub url: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Admin edit of a subscription. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}
