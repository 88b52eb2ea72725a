//! In-memory work queue for execution notifications.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;

use crate::errors::QueueError;
use crate::traits::{MessageReceipt, QueueMessage, QueueProvider, QueueReceiver};

const SUBSCRIBER_CAPACITY: usize = 1000;

/// In-memory queue with work-queue semantics.
///
/// Each message goes to exactly one subscriber of its topic, chosen
/// round-robin. Messages published while a topic has no live subscriber (or
/// every subscriber is full) are kept in a backlog and handed to the next
/// subscriber, so a late-starting worker still sees them. Delivered messages
/// stay in flight until acked.
pub struct InMemoryQueue {
    topics: Arc<Mutex<HashMap<String, Topic>>>,
    in_flight: Arc<Mutex<HashMap<String, QueueMessage>>>,
}

#[derive(Default)]
struct Topic {
    subscribers: Vec<mpsc::Sender<QueueMessage>>,
    next: usize,
    backlog: VecDeque<QueueMessage>,
}

impl Topic {
    /// Try every live subscriber once, starting at the round-robin cursor.
    /// Returns the message back if nobody could take it.
    fn offer(&mut self, mut msg: QueueMessage) -> Option<QueueMessage> {
        let mut attempts = self.subscribers.len();
        while attempts > 0 && !self.subscribers.is_empty() {
            let idx = self.next % self.subscribers.len();
            match self.subscribers[idx].try_send(msg) {
                Ok(()) => {
                    self.next = idx + 1;
                    return None;
                }
                Err(TrySendError::Full(returned)) => {
                    msg = returned;
                    self.next = idx + 1;
                    attempts -= 1;
                }
                Err(TrySendError::Closed(returned)) => {
                    msg = returned;
                    self.subscribers.remove(idx);
                    attempts = attempts.saturating_sub(1);
                }
            }
        }
        Some(msg)
    }
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Messages waiting for a subscriber on `topic`.
    pub async fn backlog_len(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .await
            .get(topic)
            .map(|t| t.backlog.len())
            .unwrap_or(0)
    }

    /// Delivered messages not yet acked.
    pub async fn in_flight_len(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueProvider for InMemoryQueue {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        headers: Option<&HashMap<String, String>>,
    ) -> Result<(), QueueError> {
        let msg = QueueMessage {
            payload: payload.to_vec(),
            headers: headers.cloned().unwrap_or_default(),
            receipt: MessageReceipt {
                id: uuid::Uuid::new_v4().to_string(),
            },
        };
        self.in_flight
            .lock()
            .await
            .insert(msg.receipt.id.clone(), msg.clone());

        let mut topics = self.topics.lock().await;
        let entry = topics.entry(topic.to_string()).or_default();
        if let Some(undelivered) = entry.offer(msg) {
            tracing::debug!(topic = %topic, "no subscriber available, message backlogged");
            entry.backlog.push_back(undelivered);
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<QueueReceiver, QueueError> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);

        let mut topics = self.topics.lock().await;
        let entry = topics.entry(topic.to_string()).or_default();
        while let Some(msg) = entry.backlog.pop_front() {
            match tx.try_send(msg) {
                Ok(()) => {}
                Err(TrySendError::Full(msg)) | Err(TrySendError::Closed(msg)) => {
                    entry.backlog.push_front(msg);
                    break;
                }
            }
        }
        entry.subscribers.push(tx);

        Ok(QueueReceiver { rx })
    }

    async fn ack(&self, receipt: &MessageReceipt) -> Result<(), QueueError> {
        self.in_flight.lock().await.remove(&receipt.id);
        Ok(())
    }
}
