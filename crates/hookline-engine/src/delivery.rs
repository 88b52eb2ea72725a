//! Webhook fan-out for one event.
//!
//! Every active subscription for the event gets its own tokio task, so a
//! slow or failing endpoint never holds up the others. Each attempt is
//! bounded by the delivery timeout, and at most `max_concurrent_deliveries`
//! requests are in flight at once. Outcomes are recorded on the registry and
//! returned in a [`DeliveryReport`]; nothing here is ever surfaced as an
//! error to the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::config::DispatchConfig;
use crate::errors::DeliveryError;
use crate::traits::{SubscriptionStore, WebhookTransport};
use crate::types::{Event, Subscription};

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub subscription_id: String,
    pub url: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

/// All delivery outcomes for one event, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub event_name: String,
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DeliveryReport {
    pub fn empty(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            outcomes: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }
}

/// Delivers events to their webhook subscribers.
pub struct DeliveryEngine {
    registry: Arc<dyn SubscriptionStore>,
    transport: Arc<dyn WebhookTransport>,
    timeout: Duration,
    max_concurrent: usize,
}

impl DeliveryEngine {
    pub fn new(
        registry: Arc<dyn SubscriptionStore>,
        transport: Arc<dyn WebhookTransport>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            registry,
            transport,
            timeout: config.delivery_timeout,
            max_concurrent: config.max_concurrent_deliveries.max(1),
        }
    }

    /// POST the event payload to every active subscription for its name.
    pub async fn dispatch(&self, event: &Event) -> DeliveryReport {
        let subscriptions = match self.registry.find_active(&event.event_name).await {
            Ok(subs) => subs,
            Err(e) => {
                tracing::warn!(
                    event_name = %event.event_name,
                    error = %e,
                    "failed to load subscriptions, skipping delivery"
                );
                return DeliveryReport::empty(&event.event_name);
            }
        };

        if subscriptions.is_empty() {
            tracing::debug!(event_name = %event.event_name, "no active subscriptions");
            return DeliveryReport::empty(&event.event_name);
        }

        let body = Arc::new(event.payload());
        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut running = FuturesUnordered::new();

        for sub in subscriptions {
            let transport = Arc::clone(&self.transport);
            let body = Arc::clone(&body);
            let permits = Arc::clone(&permits);
            let url = sub.url.clone();
            let timeout = self.timeout;

            let handle = tokio::spawn(async move {
                // The semaphore is never closed; a failed acquire just runs unbounded.
                let _permit = permits.acquire_owned().await.ok();
                let started = Instant::now();
                let result =
                    match tokio::time::timeout(timeout, transport.post_json(&url, &[], &body))
                        .await
                    {
                        Ok(r) => r,
                        Err(_) => Err(DeliveryError::Timeout {
                            elapsed_ms: started.elapsed().as_millis() as u64,
                        }),
                    };
                (result, started.elapsed().as_millis() as u64)
            });

            running.push(async move { (sub, handle.await) });
        }

        let mut report = DeliveryReport::empty(&event.event_name);
        while let Some((sub, joined)) = running.next().await {
            let (result, elapsed_ms) = match joined {
                Ok(r) => r,
                Err(e) => (
                    Err(DeliveryError::Transport {
                        message: format!("delivery task panicked: {e}"),
                    }),
                    0,
                ),
            };
            report
                .outcomes
                .push(self.record(&event.event_name, sub, result, elapsed_ms).await);
        }

        tracing::info!(
            event_name = %event.event_name,
            entity_id = %event.entity_id,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "webhook delivery finished"
        );
        report
    }

    async fn record(
        &self,
        event_name: &str,
        sub: Subscription,
        result: Result<(), DeliveryError>,
        elapsed_ms: u64,
    ) -> DeliveryOutcome {
        let error = match result {
            Ok(()) => {
                if let Err(e) = self.registry.record_success(&sub.id).await {
                    tracing::warn!(subscription_id = %sub.id, error = %e, "failed to record delivery success");
                }
                None
            }
            Err(err) => {
                tracing::warn!(
                    subscription_id = %sub.id,
                    event_name = %event_name,
                    url = %sub.url,
                    error = %err,
                    "webhook delivery failed"
                );
                if let Err(e) = self.registry.record_failure(&sub.id).await {
                    tracing::warn!(subscription_id = %sub.id, error = %e, "failed to record delivery failure");
                }
                Some(err.to_string())
            }
        };

        DeliveryOutcome {
            subscription_id: sub.id,
            url: sub.url,
            success: error.is_none(),
            error,
            elapsed_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::{InMemorySubscriptionStore, ReqwestTransport};
    use crate::errors::RegistryError;
    use crate::payload::{EntityChange, EntityRecord, Lead, PayloadBuilder};
    use crate::types::{NewSubscription, SubscriptionPatch};
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::{json, Map, Value};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lead_created(fields: Value) -> Event {
        let fields: Map<String, Value> = fields.as_object().cloned().unwrap();
        PayloadBuilder::from_fields(&Lead::SCHEMA, EntityChange::Created(fields), Utc::now())
    }

    fn engine(registry: Arc<InMemorySubscriptionStore>, config: &DispatchConfig) -> DeliveryEngine {
        let transport = Arc::new(ReqwestTransport::from_config(config).unwrap());
        DeliveryEngine::new(registry, transport, config)
    }

    async fn subscribe(store: &InMemorySubscriptionStore, event: &str, url: String) -> Subscription {
        store
            .create(NewSubscription {
                name: format!("{event} hook"),
                event_name: event.into(),
                url,
                is_active: true,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn lead_created_scenario() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({
                "trigger_event": "LEAD_CREATED",
                "name": "Jane",
                "email": "jane@x.com"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(InMemorySubscriptionStore::new());
        let sub = subscribe(&store, "LEAD_CREATED", format!("{}/hook", server.uri())).await;

        let report = engine(store.clone(), &DispatchConfig::default())
            .dispatch(&lead_created(json!({"name": "Jane", "email": "jane@x.com"})))
            .await;

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 0);
        let sub = store.get(&sub.id).await.unwrap().unwrap();
        assert_eq!(sub.total_calls, 1);
        assert_eq!(sub.success_count, 1);
        assert!(sub.last_triggered.is_some());
    }

    #[tokio::test]
    async fn one_failing_subscriber_does_not_affect_others() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/c"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let store = Arc::new(InMemorySubscriptionStore::new());
        let a = subscribe(&store, "LEAD_CREATED", format!("{}/a", server.uri())).await;
        let b = subscribe(&store, "LEAD_CREATED", format!("{}/b", server.uri())).await;
        let c = subscribe(&store, "LEAD_CREATED", format!("{}/c", server.uri())).await;

        let report = engine(store.clone(), &DispatchConfig::default())
            .dispatch(&lead_created(json!({"id": "l1", "name": "Jane"})))
            .await;
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.failed(), 1);

        for (id, ok) in [(&a.id, true), (&b.id, false), (&c.id, true)] {
            let sub = store.get(id).await.unwrap().unwrap();
            assert_eq!(sub.total_calls, 1);
            assert_eq!(sub.success_count, u64::from(ok));
            assert_eq!(sub.failure_count, u64::from(!ok));
        }
        let b_outcome = report
            .outcomes
            .iter()
            .find(|o| o.subscription_id == b.id)
            .unwrap();
        assert!(b_outcome.error.as_deref().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn slow_subscriber_times_out_without_blocking_others() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/fast"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let store = Arc::new(InMemorySubscriptionStore::new());
        let slow = subscribe(&store, "LEAD_CREATED", format!("{}/slow", server.uri())).await;
        let fast = subscribe(&store, "LEAD_CREATED", format!("{}/fast", server.uri())).await;

        let config = DispatchConfig {
            delivery_timeout: Duration::from_millis(200),
            ..DispatchConfig::default()
        };
        let report = engine(store.clone(), &config)
            .dispatch(&lead_created(json!({"id": "l1"})))
            .await;

        assert_eq!(report.succeeded(), 1);
        assert_eq!(store.get(&slow.id).await.unwrap().unwrap().failure_count, 1);
        assert_eq!(store.get(&fast.id).await.unwrap().unwrap().success_count, 1);
    }

    #[tokio::test]
    async fn inactive_and_other_event_subscriptions_are_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(InMemorySubscriptionStore::new());
        subscribe(&store, "LEAD_CREATED", server.uri()).await;
        subscribe(&store, "LEAD_UPDATED", server.uri()).await;
        let paused = subscribe(&store, "LEAD_CREATED", server.uri()).await;
        store
            .update(
                &paused.id,
                SubscriptionPatch {
                    is_active: Some(false),
                    ..SubscriptionPatch::default()
                },
            )
            .await
            .unwrap();

        let report = engine(store, &DispatchConfig::default())
            .dispatch(&lead_created(json!({"id": "l1"})))
            .await;
        assert_eq!(report.outcomes.len(), 1);
    }

    #[tokio::test]
    async fn repeated_dispatches_keep_stats_consistent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bad"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = Arc::new(InMemorySubscriptionStore::new());
        let ok = subscribe(&store, "LEAD_CREATED", format!("{}/ok", server.uri())).await;
        let bad = subscribe(&store, "LEAD_CREATED", format!("{}/bad", server.uri())).await;
        let engine = Arc::new(engine(store.clone(), &DispatchConfig::default()));

        let mut tasks = Vec::new();
        for i in 0..10 {
            let engine = Arc::clone(&engine);
            tasks.push(tokio::spawn(async move {
                engine
                    .dispatch(&lead_created(json!({"id": format!("l{i}")})))
                    .await
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        for id in [&ok.id, &bad.id] {
            let sub = store.get(id).await.unwrap().unwrap();
            assert_eq!(sub.total_calls, 10);
            assert_eq!(sub.success_count + sub.failure_count, sub.total_calls);
        }
    }

    struct BrokenRegistry;

    #[async_trait]
    impl SubscriptionStore for BrokenRegistry {
        async fn find_active(&self, _: &str) -> Result<Vec<Subscription>, RegistryError> {
            Err(RegistryError::Store {
                message: "connection reset".into(),
            })
        }
        async fn record_success(&self, _: &str) -> Result<(), RegistryError> {
            Ok(())
        }
        async fn record_failure(&self, _: &str) -> Result<(), RegistryError> {
            Ok(())
        }
        async fn create(&self, new: NewSubscription) -> Result<Subscription, RegistryError> {
            Ok(Subscription::new(new))
        }
        async fn get(&self, _: &str) -> Result<Option<Subscription>, RegistryError> {
            Ok(None)
        }
        async fn list(&self) -> Result<Vec<Subscription>, RegistryError> {
            Ok(vec![])
        }
        async fn update(
            &self,
            id: &str,
            _: SubscriptionPatch,
        ) -> Result<Subscription, RegistryError> {
            Err(RegistryError::NotFound { id: id.into() })
        }
        async fn delete(&self, _: &str) -> Result<bool, RegistryError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn registry_failure_yields_empty_report() {
        let config = DispatchConfig::default();
        let engine = DeliveryEngine::new(
            Arc::new(BrokenRegistry),
            Arc::new(ReqwestTransport::from_config(&config).unwrap()),
            &config,
        );
        let report = engine.dispatch(&lead_created(json!({"id": "l1"}))).await;
        assert_eq!(report.event_name, "LEAD_CREATED");
        assert!(report.outcomes.is_empty());
    }
}
