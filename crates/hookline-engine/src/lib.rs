//! Hookline: event-driven webhook and automation dispatch.
//!
//! A domain write (a lead created, an invoice updated, a receipt deleted)
//! becomes an [`Event`] with a canonical JSON payload. The [`Engine`] fans the
//! payload out to every active webhook subscription for the event name,
//! keeps per-subscription delivery statistics, and starts a tracked
//! execution for every active automation whose trigger matches.
//!
//! The engine never fails the write that produced the event. Delivery and
//! automation errors are logged, counted, and recorded, but not returned.
//!
//! Storage, queueing, and HTTP are pluggable traits with in-memory and
//! reqwest defaults; SQL-backed stores live in `hookline-storage`.

pub mod automation;
pub mod config;
pub mod defaults;
pub mod delivery;
pub mod engine;
pub mod errors;
pub mod payload;
pub mod traits;
pub mod types;
pub mod worker;

// Re-export public types at the crate level.

// automation
pub use automation::{AutomationMatcher, ExecutionRunner, MatchedAutomation};

// config
pub use config::{DispatchConfig, ExecutionMode, DEFAULT_NOTIFICATION_TOPIC};

// defaults
pub use defaults::{
    InMemoryAutomationStore, InMemoryExecutionStore, InMemoryQueue, InMemorySubscriptionStore,
    ReqwestTransport,
};

// delivery
pub use delivery::{DeliveryEngine, DeliveryOutcome, DeliveryReport};

// engine
pub use engine::{DispatchReport, Engine, EngineBuilder, EngineError};

// errors
pub use errors::{
    ActionError, AutomationStoreError, ConfigError, DeliveryError, ExecutionStoreError,
    QueueError, RegistryError,
};

// payload
pub use payload::{EntityChange, EntityRecord, EventSchema, PayloadBuilder};

// traits
pub use traits::{
    AutomationStore, ExecutionStore, MessageReceipt, QueueMessage, QueueProvider, QueueReceiver,
    SubscriptionStore, WebhookTransport,
};

// types
pub use types::*;

// worker
pub use worker::ExecutionWorker;
