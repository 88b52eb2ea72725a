//! Default implementations for all pluggable dispatch traits.
//!
//! These defaults allow the engine to start with zero external configuration.
//! Each can be replaced via the [`EngineBuilder`](crate::EngineBuilder).

pub mod http_transport;
pub mod in_memory_automations;
pub mod in_memory_executions;
pub mod in_memory_queue;
pub mod in_memory_registry;
pub use http_transport::ReqwestTransport;
pub use in_memory_automations::InMemoryAutomationStore;
pub use in_memory_executions::InMemoryExecutionStore;
pub use in_memory_queue::InMemoryQueue;
pub use in_memory_registry::InMemorySubscriptionStore;
