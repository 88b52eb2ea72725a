//! Engine builder: assembles stores, queue, and transport into an [`Engine`].

use std::sync::Arc;

use super::error::EngineError;
use super::Engine;
use crate::automation::{AutomationMatcher, ExecutionRunner};
use crate::config::DispatchConfig;
use crate::defaults::{
    InMemoryAutomationStore, InMemoryExecutionStore, InMemoryQueue, InMemorySubscriptionStore,
    ReqwestTransport,
};
use crate::delivery::DeliveryEngine;
use crate::traits::{
    AutomationStore, ExecutionStore, QueueProvider, SubscriptionStore, WebhookTransport,
};

/// Builder for assembling the [`Engine`].
///
/// All provider fields are optional; in-memory defaults and a
/// [`ReqwestTransport`] are applied during [`build()`](EngineBuilder::build).
pub struct EngineBuilder {
    subscriptions: Option<Arc<dyn SubscriptionStore>>,
    automations: Option<Arc<dyn AutomationStore>>,
    executions: Option<Arc<dyn ExecutionStore>>,
    queue: Option<Arc<dyn QueueProvider>>,
    transport: Option<Arc<dyn WebhookTransport>>,
    config: DispatchConfig,
}

impl EngineBuilder {
    pub(super) fn new() -> Self {
        Self {
            subscriptions: None,
            automations: None,
            executions: None,
            queue: None,
            transport: None,
            config: DispatchConfig::default(),
        }
    }

    /// Set the subscription registry. Default: [`InMemorySubscriptionStore`].
    pub fn subscriptions(mut self, store: impl SubscriptionStore + 'static) -> Self {
        self.subscriptions = Some(Arc::new(store));
        self
    }

    /// Set the automation store. Default: [`InMemoryAutomationStore`].
    pub fn automations(mut self, store: impl AutomationStore + 'static) -> Self {
        self.automations = Some(Arc::new(store));
        self
    }

    /// Set the execution store. Default: [`InMemoryExecutionStore`].
    pub fn executions(mut self, store: impl ExecutionStore + 'static) -> Self {
        self.executions = Some(Arc::new(store));
        self
    }

    /// Set the notification queue. Default: [`InMemoryQueue`].
    pub fn queue(mut self, provider: impl QueueProvider + 'static) -> Self {
        self.queue = Some(Arc::new(provider));
        self
    }

    /// Set the outbound HTTP transport. Default: [`ReqwestTransport`] built
    /// from the dispatch config.
    pub fn transport(mut self, transport: impl WebhookTransport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Share an already-`Arc`ed subscription registry with the engine.
    pub fn shared_subscriptions(mut self, store: Arc<dyn SubscriptionStore>) -> Self {
        self.subscriptions = Some(store);
        self
    }

    /// Share an already-`Arc`ed automation store with the engine.
    pub fn shared_automations(mut self, store: Arc<dyn AutomationStore>) -> Self {
        self.automations = Some(store);
        self
    }

    /// Share an already-`Arc`ed execution store with the engine.
    pub fn shared_executions(mut self, store: Arc<dyn ExecutionStore>) -> Self {
        self.executions = Some(store);
        self
    }

    /// Share an already-`Arc`ed queue with the engine.
    pub fn shared_queue(mut self, provider: Arc<dyn QueueProvider>) -> Self {
        self.queue = Some(provider);
        self
    }

    /// Set the dispatch configuration.
    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Assemble the engine, applying defaults for any unset providers.
    pub fn build(self) -> Result<Engine, EngineError> {
        if self.config.max_concurrent_deliveries == 0 {
            return Err(EngineError::Build {
                message: "max_concurrent_deliveries must be at least 1".into(),
            });
        }

        let subscriptions: Arc<dyn SubscriptionStore> = self
            .subscriptions
            .unwrap_or_else(|| Arc::new(InMemorySubscriptionStore::new()));
        let automations: Arc<dyn AutomationStore> = self
            .automations
            .unwrap_or_else(|| Arc::new(InMemoryAutomationStore::new()));
        let executions: Arc<dyn ExecutionStore> = self
            .executions
            .unwrap_or_else(|| Arc::new(InMemoryExecutionStore::new()));
        let queue: Arc<dyn QueueProvider> =
            self.queue.unwrap_or_else(|| Arc::new(InMemoryQueue::new()));
        let transport: Arc<dyn WebhookTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(ReqwestTransport::from_config(&self.config)?),
        };

        let delivery = Arc::new(DeliveryEngine::new(
            Arc::clone(&subscriptions),
            Arc::clone(&transport),
            &self.config,
        ));
        let matcher = Arc::new(AutomationMatcher::new(
            Arc::clone(&automations),
            Arc::clone(&executions),
            Arc::clone(&queue),
            self.config.notification_topic.clone(),
        ));
        let runner = Arc::new(ExecutionRunner::new(
            Arc::clone(&automations),
            Arc::clone(&executions),
            transport,
            self.config.delivery_timeout,
        ));

        Ok(Engine {
            config: Arc::new(self.config),
            subscriptions,
            automations,
            executions,
            queue,
            delivery,
            matcher,
            runner,
        })
    }
}
