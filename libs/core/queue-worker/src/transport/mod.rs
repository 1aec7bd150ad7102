//! Broker-agnostic transport contract.
//!
//! A transport moves raw bytes between producers and consumers through
//! named, durable queues with manual acknowledgment. Payload schemas are the
//! business of the caller; the only metadata the transport carries is the
//! retry counter used by the worker's bounded-retry policy.

pub mod memory;
#[cfg(feature = "rabbitmq")]
pub mod rabbitmq;

use crate::error::QueueError;
use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;

/// Header carrying how many times a message has been republished for retry.
pub const RETRY_COUNT_HEADER: &str = "x-retry-count";

/// A message about to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub body: Vec<u8>,
    pub retry_count: u32,
}

impl OutgoingMessage {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            retry_count: 0,
        }
    }

    /// Serialize `payload` as JSON.
    pub fn json<T: Serialize>(payload: &T) -> Result<Self, QueueError> {
        Ok(Self::new(serde_json::to_vec(payload)?))
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }
}

/// Settles a single delivery on the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<(), QueueError>;

    /// Negative acknowledgment. `requeue = false` hands the message to the
    /// queue's dead-letter route instead of redelivering it.
    async fn nack(&self, requeue: bool) -> Result<(), QueueError>;
}

/// A message received from a subscription, not yet settled.
pub struct Delivery {
    pub queue: String,
    pub body: Vec<u8>,
    pub retry_count: u32,
    /// Set by the broker when the message was delivered before and not acked
    pub redelivered: bool,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(
        queue: impl Into<String>,
        body: Vec<u8>,
        retry_count: u32,
        redelivered: bool,
        acker: Box<dyn Acknowledger>,
    ) -> Self {
        Self {
            queue: queue.into(),
            body,
            retry_count,
            redelivered,
            acker,
        }
    }

    pub fn decode<J: DeserializeOwned>(&self) -> Result<J, QueueError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub async fn ack(&self) -> Result<(), QueueError> {
        self.acker.ack().await
    }

    pub async fn nack(&self, requeue: bool) -> Result<(), QueueError> {
        self.acker.nack(requeue).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("queue", &self.queue)
            .field("bytes", &self.body.len())
            .field("retry_count", &self.retry_count)
            .field("redelivered", &self.redelivered)
            .finish()
    }
}

/// Live consumer attached to one queue.
///
/// The stream ends or yields an error when the underlying channel dies;
/// the worker treats both as fatal.
pub struct Subscription {
    queue: String,
    deliveries: BoxStream<'static, Result<Delivery, QueueError>>,
}

impl Subscription {
    pub fn new<S>(queue: impl Into<String>, deliveries: S) -> Self
    where
        S: Stream<Item = Result<Delivery, QueueError>> + Send + 'static,
    {
        Self {
            queue: queue.into(),
            deliveries: deliveries.boxed(),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub async fn next(&mut self) -> Option<Result<Delivery, QueueError>> {
        self.deliveries.next().await
    }
}

/// Durable publish/subscribe over named queues.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Declare `queue` and its dead-letter queue. Idempotent.
    async fn declare(&self, queue: &str) -> Result<(), QueueError>;

    /// Declare `queue` if needed and publish `message` durably.
    async fn publish(&self, queue: &str, message: OutgoingMessage) -> Result<(), QueueError>;

    /// Declare `queue` if needed and attach a consumer that holds at most
    /// `prefetch` unsettled deliveries.
    async fn subscribe(
        &self,
        queue: &str,
        consumer_tag: &str,
        prefetch: u16,
    ) -> Result<Subscription, QueueError>;

    fn provider_name(&self) -> &'static str;

    fn is_healthy(&self) -> bool {
        true
    }
}
