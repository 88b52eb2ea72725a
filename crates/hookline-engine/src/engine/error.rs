//! Engine error types.

use thiserror::Error;

use crate::errors::{ConfigError, DeliveryError, ExecutionStoreError, QueueError};

/// Errors from [`Engine`](super::Engine) operations.
///
/// None of these come out of the dispatch entry points, which absorb and log
/// every downstream failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// An error during engine construction.
    #[error("build error: {message}")]
    Build { message: String },
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("transport error: {0}")]
    Transport(#[from] DeliveryError),
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("execution store error: {0}")]
    ExecutionStore(#[from] ExecutionStoreError),
}
