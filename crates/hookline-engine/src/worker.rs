//! Background consumer of execution notifications.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::automation::ExecutionRunner;
use crate::errors::QueueError;
use crate::traits::{QueueMessage, QueueProvider};
use crate::types::ExecutionNotification;

/// Subscribes to the notification topic and runs each announced execution.
///
/// Messages are processed one at a time and acked after the run finishes,
/// whatever its outcome. Start several workers on the same queue to run
/// executions in parallel.
pub struct ExecutionWorker {
    queue: Arc<dyn QueueProvider>,
    runner: Arc<ExecutionRunner>,
    topic: String,
}

impl ExecutionWorker {
    pub fn new(
        queue: Arc<dyn QueueProvider>,
        runner: Arc<ExecutionRunner>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            runner,
            topic: topic.into(),
        }
    }

    /// Subscribe and spawn the consume loop. The loop ends when `shutdown`
    /// fires or the subscription closes.
    pub async fn start(
        self,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<JoinHandle<()>, QueueError> {
        let mut sub = self.queue.subscribe(&self.topic).await?;
        let mut shutdown = shutdown;

        Ok(tokio::spawn(async move {
            tracing::info!(topic = %self.topic, "execution worker started");
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    msg = sub.rx.recv() => match msg {
                        Some(msg) => self.handle(msg).await,
                        None => break,
                    },
                }
            }
            tracing::info!(topic = %self.topic, "execution worker stopped");
        }))
    }

    async fn handle(&self, msg: QueueMessage) {
        match serde_json::from_slice::<ExecutionNotification>(&msg.payload) {
            Ok(notification) => {
                if let Err(e) = self.runner.run(&notification.execution_id).await {
                    tracing::error!(
                        execution_id = %notification.execution_id,
                        error = %e,
                        "execution store error while running execution"
                    );
                }
            }
            Err(e) => tracing::warn!(error = %e, "undecodable execution notification, dropping"),
        }

        if let Err(e) = self.queue.ack(&msg.receipt).await {
            tracing::warn!(error = %e, "failed to ack execution notification");
        }
    }
}
