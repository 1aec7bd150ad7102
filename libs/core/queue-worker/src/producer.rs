//! Typed producer for one queue
//!
//! ```rust,ignore
//! let producer = QueueProducer::from_queue_def::<NotificationQueue>(transport.clone());
//! producer.send(&notification).await?;
//! ```

use crate::error::QueueError;
use crate::registry::QueueDef;
use crate::transport::{OutgoingMessage, QueueTransport};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Serializes payloads to JSON and publishes them to a fixed queue.
///
/// Errors are returned to the caller; a failed publish is never retried here.
#[derive(Clone)]
pub struct QueueProducer {
    transport: Arc<dyn QueueTransport>,
    queue: String,
}

impl QueueProducer {
    pub fn new(transport: Arc<dyn QueueTransport>, queue: impl Into<String>) -> Self {
        Self {
            transport,
            queue: queue.into(),
        }
    }

    pub fn from_queue_def<Q: QueueDef>(transport: Arc<dyn QueueTransport>) -> Self {
        Self::new(transport, Q::QUEUE_NAME)
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub async fn send<T: Serialize + ?Sized>(&self, payload: &T) -> Result<(), QueueError> {
        let message = OutgoingMessage::new(serde_json::to_vec(payload)?);
        self.transport.publish(&self.queue, message).await?;
        debug!(queue = %self.queue, "Message published");
        Ok(())
    }

    /// Publish each payload in order, stopping at the first failure.
    ///
    /// Returns how many were published.
    pub async fn send_batch<T: Serialize>(&self, payloads: &[T]) -> Result<usize, QueueError> {
        for payload in payloads {
            self.send(payload).await?;
        }
        Ok(payloads.len())
    }
}
