//! Dispatch configuration.

use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;

/// Default notification topic for execution hand-off.
pub const DEFAULT_NOTIFICATION_TOPIC: &str = "workflow_execution";

/// How matched automations are run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Publish a notification and let an [`ExecutionWorker`](crate::ExecutionWorker) run it.
    #[default]
    Queued,
    /// Run the automation on the dispatching task right after matching.
    Inline,
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" | "queue" => Ok(Self::Queued),
            "inline" => Ok(Self::Inline),
            _ => Err(format!("unknown execution mode: {s}")),
        }
    }
}

/// Tunables for delivery and automation hand-off.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Upper bound on one outbound webhook call. Default: 10s.
    pub delivery_timeout: Duration,
    /// Deliveries issued concurrently within one dispatch. Default: 16.
    pub max_concurrent_deliveries: usize,
    /// Topic carrying [`ExecutionNotification`](crate::types::ExecutionNotification)s.
    pub notification_topic: String,
    /// Age after which a `pending` execution is republished. Default: 300s.
    pub pending_visibility_timeout: Duration,
    /// Age after which a `running` execution is treated as abandoned and
    /// failed. Default: 3600s.
    pub running_timeout: Duration,
    pub execution_mode: ExecutionMode,
    pub user_agent: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: Duration::from_secs(10),
            max_concurrent_deliveries: 16,
            notification_topic: DEFAULT_NOTIFICATION_TOPIC.to_string(),
            pending_visibility_timeout: Duration::from_secs(300),
            running_timeout: Duration::from_secs(3600),
            execution_mode: ExecutionMode::default(),
            user_agent: concat!("hookline/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl DispatchConfig {
    /// Defaults overlaid with `HOOKLINE_*` environment variables.
    ///
    /// Unset variables keep their default; set-but-unparsable variables are
    /// an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(secs) = parse_var::<u64>(&lookup, "HOOKLINE_DELIVERY_TIMEOUT_SECS")? {
            config.delivery_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = parse_var::<usize>(&lookup, "HOOKLINE_MAX_CONCURRENT_DELIVERIES")? {
            if n == 0 {
                return Err(ConfigError::Invalid {
                    key: "HOOKLINE_MAX_CONCURRENT_DELIVERIES".into(),
                    message: "must be at least 1".into(),
                });
            }
            config.max_concurrent_deliveries = n;
        }
        if let Some(topic) = lookup("HOOKLINE_NOTIFICATION_TOPIC") {
            config.notification_topic = topic;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "HOOKLINE_PENDING_TIMEOUT_SECS")? {
            config.pending_visibility_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "HOOKLINE_RUNNING_TIMEOUT_SECS")? {
            config.running_timeout = Duration::from_secs(secs);
        }
        if let Some(mode) = parse_var::<ExecutionMode>(&lookup, "HOOKLINE_EXECUTION_MODE")? {
            config.execution_mode = mode;
        }

        Ok(config)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key: key.to_string(),
                message: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.delivery_timeout, Duration::from_secs(10));
        assert_eq!(config.notification_topic, "workflow_execution");
        assert_eq!(config.execution_mode, ExecutionMode::Queued);
    }

    #[test]
    fn env_overrides() {
        let config = DispatchConfig::from_lookup(lookup(&[
            ("HOOKLINE_DELIVERY_TIMEOUT_SECS", "3"),
            ("HOOKLINE_NOTIFICATION_TOPIC", "automations"),
            ("HOOKLINE_EXECUTION_MODE", "Inline"),
            ("HOOKLINE_RUNNING_TIMEOUT_SECS", "120"),
        ]))
        .unwrap();
        assert_eq!(config.delivery_timeout, Duration::from_secs(3));
        assert_eq!(config.notification_topic, "automations");
        assert_eq!(config.execution_mode, ExecutionMode::Inline);
        assert_eq!(config.running_timeout, Duration::from_secs(120));
        assert_eq!(config.max_concurrent_deliveries, 16);
    }

    #[test]
    fn invalid_values_are_reported_with_their_key() {
        let err = DispatchConfig::from_lookup(lookup(&[("HOOKLINE_PENDING_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        match err {
            ConfigError::Invalid { key, .. } => assert_eq!(key, "HOOKLINE_PENDING_TIMEOUT_SECS"),
        }
    }

    #[test]
    fn zero_concurrency_rejected() {
        assert!(DispatchConfig::from_lookup(lookup(&[(
            "HOOKLINE_MAX_CONCURRENT_DELIVERIES",
            "0"
        )]))
        .is_err());
    }
}
