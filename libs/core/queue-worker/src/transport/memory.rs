//! In-process transport with broker semantics.
//!
//! Used by tests and by local runs without a broker. It honors the same
//! contract as RabbitMQ where the workers can observe it:
//! - FIFO per queue, requeued messages go back to the head
//! - at most `prefetch` unsettled deliveries per subscription
//! - `nack(requeue = false)` moves the message to `<queue>.dlq`
//! - competing subscriptions on one queue each get a message exactly once

use super::{Acknowledger, Delivery, OutgoingMessage, QueueTransport, Subscription};
use crate::error::QueueError;
use crate::registry::{DLQ_SUFFIX, dlq_name};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

/// A message sitting in a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub body: Vec<u8>,
    pub retry_count: u32,
    pub redelivered: bool,
}

/// Per-queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub published: u64,
    pub delivered: u64,
    pub acked: u64,
    pub requeued: u64,
    pub rejected: u64,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<StoredMessage>,
    unacked: HashMap<u64, StoredMessage>,
    stats: QueueStats,
}

#[derive(Default)]
struct Inner {
    queues: Mutex<HashMap<String, QueueState>>,
    next_tag: Mutex<u64>,
    notify: Notify,
}

impl Inner {
    fn queues(&self) -> Result<MutexGuard<'_, HashMap<String, QueueState>>, QueueError> {
        self.queues
            .lock()
            .map_err(|_| QueueError::Transport("in-memory broker state poisoned".into()))
    }

    fn declare(&self, queue: &str) -> Result<(), QueueError> {
        let mut queues = self.queues()?;
        queues.entry(queue.to_string()).or_default();
        if !queue.ends_with(DLQ_SUFFIX) {
            queues.entry(dlq_name(queue)).or_default();
        }
        Ok(())
    }

    fn push(&self, queue: &str, message: StoredMessage) -> Result<(), QueueError> {
        {
            let mut queues = self.queues()?;
            let state = queues.entry(queue.to_string()).or_default();
            state.ready.push_back(message);
            state.stats.published += 1;
        }
        self.notify.notify_waiters();
        Ok(())
    }

    fn next_tag(&self) -> Result<u64, QueueError> {
        let mut tag = self
            .next_tag
            .lock()
            .map_err(|_| QueueError::Transport("in-memory broker state poisoned".into()))?;
        *tag += 1;
        Ok(*tag)
    }

    /// Move the head of `queue` to its unacked set.
    fn take(&self, queue: &str) -> Result<Option<(u64, StoredMessage)>, QueueError> {
        let tag = self.next_tag()?;
        let mut queues = self.queues()?;
        let Some(state) = queues.get_mut(queue) else {
            return Ok(None);
        };
        let Some(message) = state.ready.pop_front() else {
            return Ok(None);
        };
        state.unacked.insert(tag, message.clone());
        state.stats.delivered += 1;
        Ok(Some((tag, message)))
    }

    fn settle(&self, queue: &str, tag: u64, outcome: Settle) -> Result<(), QueueError> {
        let mut queues = self.queues()?;
        let state = queues
            .get_mut(queue)
            .ok_or_else(|| QueueError::Transport(format!("unknown queue {}", queue)))?;
        let mut message = state
            .unacked
            .remove(&tag)
            .ok_or_else(|| QueueError::Transport(format!("unknown delivery tag {}", tag)))?;

        match outcome {
            Settle::Ack => state.stats.acked += 1,
            Settle::Requeue => {
                state.stats.requeued += 1;
                message.redelivered = true;
                state.ready.push_front(message);
            }
            Settle::Reject => {
                state.stats.rejected += 1;
                if !queue.ends_with(DLQ_SUFFIX) {
                    let dlq = queues.entry(dlq_name(queue)).or_default();
                    dlq.ready.push_back(message);
                    dlq.stats.published += 1;
                }
            }
        }
        drop(queues);
        self.notify.notify_waiters();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Settle {
    Ack,
    Requeue,
    Reject,
}

struct MemoryAcker {
    inner: Arc<Inner>,
    queue: String,
    tag: u64,
    settled: AtomicBool,
    // Returned to the subscription's prefetch budget on drop
    _permit: OwnedSemaphorePermit,
}

impl MemoryAcker {
    fn settle(&self, outcome: Settle) -> Result<(), QueueError> {
        if self.settled.swap(true, Ordering::SeqCst) {
            return Err(QueueError::Transport(format!(
                "delivery {} on {} already settled",
                self.tag, self.queue
            )));
        }
        self.inner.settle(&self.queue, self.tag, outcome)
    }
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> Result<(), QueueError> {
        self.settle(Settle::Ack)
    }

    async fn nack(&self, requeue: bool) -> Result<(), QueueError> {
        self.settle(if requeue { Settle::Requeue } else { Settle::Reject })
    }
}

/// Cheap to clone; clones share the same queues.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    inner: Arc<Inner>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages waiting in `queue`, oldest first.
    pub fn ready_messages(&self, queue: &str) -> Vec<StoredMessage> {
        self.inner
            .queues()
            .map(|q| {
                q.get(queue)
                    .map(|s| s.ready.iter().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    pub fn depth(&self, queue: &str) -> usize {
        self.ready_messages(queue).len()
    }

    pub fn unacked(&self, queue: &str) -> usize {
        self.inner
            .queues()
            .map(|q| q.get(queue).map(|s| s.unacked.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn stats(&self, queue: &str) -> QueueStats {
        self.inner
            .queues()
            .map(|q| q.get(queue).map(|s| s.stats).unwrap_or_default())
            .unwrap_or_default()
    }
}

#[async_trait]
impl QueueTransport for InMemoryTransport {
    async fn declare(&self, queue: &str) -> Result<(), QueueError> {
        self.inner.declare(queue)
    }

    async fn publish(&self, queue: &str, message: OutgoingMessage) -> Result<(), QueueError> {
        self.inner.declare(queue)?;
        self.inner.push(
            queue,
            StoredMessage {
                body: message.body,
                retry_count: message.retry_count,
                redelivered: false,
            },
        )
    }

    async fn subscribe(
        &self,
        queue: &str,
        _consumer_tag: &str,
        prefetch: u16,
    ) -> Result<Subscription, QueueError> {
        self.inner.declare(queue)?;

        let inner = Arc::clone(&self.inner);
        let budget = Arc::new(Semaphore::new(usize::from(prefetch.max(1))));
        let queue_name = queue.to_string();

        let deliveries = async_stream::stream! {
            loop {
                let Ok(permit) = Arc::clone(&budget).acquire_owned().await else {
                    break;
                };

                let taken = loop {
                    let notified = inner.notify.notified();
                    tokio::pin!(notified);
                    notified.as_mut().enable();

                    match inner.take(&queue_name) {
                        Ok(Some(taken)) => break Ok(taken),
                        Ok(None) => notified.await,
                        Err(e) => break Err(e),
                    }
                };

                match taken {
                    Ok((tag, message)) => {
                        let acker = MemoryAcker {
                            inner: Arc::clone(&inner),
                            queue: queue_name.clone(),
                            tag,
                            settled: AtomicBool::new(false),
                            _permit: permit,
                        };
                        yield Ok(Delivery::new(
                            queue_name.clone(),
                            message.body,
                            message.retry_count,
                            message.redelivered,
                            Box::new(acker),
                        ));
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        };

        Ok(Subscription::new(queue, deliveries))
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}
