//! Core worker traits and the generic `QueueWorker`.
//!
//! - `QueueJob` for message payloads
//! - `QueueProcessor` for whatever handles them
//! - `QueueWorker`, the subscribe / decode / process / settle loop

use crate::config::WorkerConfig;
use crate::dlq::{DeadLetterEntry, DeadLetterPublisher};
use crate::error::QueueError;
use crate::metrics::QueueMetrics;
use crate::transport::{Delivery, OutgoingMessage, QueueTransport};
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Serialize, de::DeserializeOwned};
use std::any::Any;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Trait for queue message payloads.
///
/// ```rust,ignore
/// #[derive(Serialize, Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct EmailSend { to: String, subject: String, body: String }
///
/// impl QueueJob for EmailSend {
///     fn job_id(&self) -> String {
///         format!("email:{}", self.to)
///     }
/// }
/// ```
pub trait QueueJob: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Identifier used in logs. Need not be unique.
    fn job_id(&self) -> String;
}

/// Trait for message processors.
///
/// Return `Ok(())` to acknowledge. An error's category decides between retry
/// and dead-lettering; a panic counts as a transient error.
#[async_trait]
pub trait QueueProcessor<J: QueueJob>: Send + Sync {
    async fn process(&self, job: &J) -> Result<(), QueueError>;

    fn name(&self) -> &'static str;
}

/// How a single delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Processed and acknowledged
    Acked,
    /// Republished with `attempt` as its retry count, original acknowledged
    Retried { attempt: u32 },
    /// Published to the dead-letter queue, original acknowledged
    DeadLettered,
    /// Failed with dead-lettering disabled; acknowledged and logged
    Discarded,
    /// Undecodable; nacked without requeue
    Rejected,
    /// Could not be retried or dead-lettered; nacked with requeue
    Requeued,
}

/// Generic queue worker.
///
/// Owns one subscription for its whole life. With the default prefetch of 1
/// the next delivery is only pulled after the current one is settled, so a
/// worker never runs two handlers at once. Workers for different queues are
/// independent tasks.
pub struct QueueWorker<J, P>
where
    J: QueueJob,
    P: QueueProcessor<J>,
{
    transport: Arc<dyn QueueTransport>,
    processor: Arc<P>,
    config: WorkerConfig,
    metrics: QueueMetrics,
    dead_letters: DeadLetterPublisher,
    _phantom: PhantomData<fn() -> J>,
}

impl<J, P> QueueWorker<J, P>
where
    J: QueueJob,
    P: QueueProcessor<J> + 'static,
{
    pub fn new(transport: Arc<dyn QueueTransport>, processor: P, config: WorkerConfig) -> Self {
        Self::with_arc_processor(transport, Arc::new(processor), config)
    }

    pub fn with_arc_processor(
        transport: Arc<dyn QueueTransport>,
        processor: Arc<P>,
        config: WorkerConfig,
    ) -> Self {
        let metrics = QueueMetrics::new(&config.queue_name, processor.name());
        Self {
            dead_letters: DeadLetterPublisher::new(Arc::clone(&transport)),
            transport,
            processor,
            config,
            metrics,
            _phantom: PhantomData,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run the worker loop until `shutdown` flips to `true`.
    ///
    /// Failing to subscribe, or losing the subscription, returns an error:
    /// the caller decides whether that ends the process.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), QueueError> {
        info!(
            queue = %self.config.queue_name,
            consumer_tag = %self.config.consumer_tag,
            processor = %self.processor.name(),
            transport = self.transport.provider_name(),
            prefetch = self.config.prefetch,
            max_retries = self.config.retry.max_retries,
            "Starting queue worker"
        );

        let mut subscription = self
            .transport
            .subscribe(
                &self.config.queue_name,
                &self.config.consumer_tag,
                self.config.prefetch,
            )
            .await
            .inspect_err(|e| error!(queue = %self.config.queue_name, error = %e, "Subscribe failed"))?;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let next = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                next = subscription.next() => next,
            };

            match next {
                Some(Ok(delivery)) => {
                    self.handle_delivery_until(delivery, Some(&mut shutdown)).await;
                }
                Some(Err(e)) => {
                    error!(queue = %self.config.queue_name, error = %e, "Subscription failed");
                    return Err(e);
                }
                None => {
                    error!(
                        queue = %self.config.queue_name,
                        transport_healthy = self.transport.is_healthy(),
                        "Subscription closed by broker"
                    );
                    return Err(QueueError::Transport(format!(
                        "subscription to {} closed",
                        self.config.queue_name
                    )));
                }
            }
        }

        info!(queue = %self.config.queue_name, "Received shutdown signal, queue worker stopped");
        Ok(())
    }

    /// Decode, process and settle one delivery.
    pub async fn handle_delivery(&self, delivery: Delivery) -> Outcome {
        self.handle_delivery_until(delivery, None).await
    }

    /// Like [`Self::handle_delivery`], but a retry backoff ends early when
    /// `shutdown` flips and the original is requeued instead.
    async fn handle_delivery_until(
        &self,
        delivery: Delivery,
        shutdown: Option<&mut watch::Receiver<bool>>,
    ) -> Outcome {
        let span = info_span!(
            "message",
            queue = %delivery.queue,
            retry_count = delivery.retry_count,
            redelivered = delivery.redelivered,
        );
        self.settle(delivery, shutdown).instrument(span).await
    }

    async fn settle(
        &self,
        delivery: Delivery,
        shutdown: Option<&mut watch::Receiver<bool>>,
    ) -> Outcome {
        self.metrics.job_received();

        let job: J = match delivery.decode() {
            Ok(job) => job,
            Err(e) => {
                error!(error = %e, bytes = delivery.body.len(), "Rejecting undecodable message");
                self.metrics.job_rejected();
                if let Err(nack_err) = delivery.nack(false).await {
                    error!(error = %nack_err, "Failed to reject message");
                }
                return Outcome::Rejected;
            }
        };

        let job_id = job.job_id();
        debug!(job_id = %job_id, "Processing message");
        let start = Instant::now();

        let result = match AssertUnwindSafe(self.processor.process(&job))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(QueueError::Panicked(panic_message(panic.as_ref()))),
        };

        match result {
            Ok(()) => {
                self.metrics.job_processed(start.elapsed());
                self.ack(&delivery).await;
                debug!(job_id = %job_id, elapsed_ms = start.elapsed().as_millis() as u64, "Message processed");
                Outcome::Acked
            }
            Err(e) => self.handle_failure(&delivery, &job_id, e, shutdown).await,
        }
    }

    async fn handle_failure(
        &self,
        delivery: &Delivery,
        job_id: &str,
        error: QueueError,
        shutdown: Option<&mut watch::Receiver<bool>>,
    ) -> Outcome {
        let category = error.category();
        let retry = &self.config.retry;
        self.metrics.job_failed(category);

        if error.should_retry(delivery.retry_count, retry.max_retries) {
            let attempt = delivery.retry_count + 1;
            let delay = category.backoff_delay(delivery.retry_count, retry.base_delay, retry.max_delay);
            warn!(
                job_id,
                error = %error,
                error_category = %category,
                attempt,
                max_retries = retry.max_retries,
                delay_ms = delay.as_millis() as u64,
                "Processing failed, scheduling retry"
            );

            if !delay.is_zero() && !backoff(delay, shutdown).await {
                warn!(job_id, "Shutdown during retry backoff, requeueing original");
                return self.requeue(delivery).await;
            }

            let message = OutgoingMessage::new(delivery.body.clone()).with_retry_count(attempt);
            return match self.transport.publish(&self.config.queue_name, message).await {
                Ok(()) => {
                    self.metrics.job_retried();
                    self.ack(delivery).await;
                    Outcome::Retried { attempt }
                }
                Err(e) => {
                    error!(job_id, error = %e, "Retry publish failed, requeueing original");
                    self.requeue(delivery).await
                }
            };
        }

        if !self.config.enable_dlq {
            error!(
                job_id,
                error = %error,
                error_category = %category,
                retry_count = delivery.retry_count,
                "Processing failed, discarding message"
            );
            self.ack(delivery).await;
            return Outcome::Discarded;
        }

        error!(
            job_id,
            error = %error,
            error_category = %category,
            retry_count = delivery.retry_count,
            dlq = %self.config.dlq_name,
            "Processing failed, moving message to dead-letter queue"
        );

        let entry = DeadLetterEntry::new(
            &self.config.queue_name,
            &delivery.body,
            &error,
            delivery.retry_count,
        );
        match self.dead_letters.publish(&self.config.dlq_name, &entry).await {
            Ok(()) => {
                self.metrics.job_dead_lettered();
                self.ack(delivery).await;
                Outcome::DeadLettered
            }
            Err(e) => {
                error!(job_id, error = %e, "Dead-letter publish failed, requeueing original");
                self.requeue(delivery).await
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) {
        if let Err(e) = delivery.ack().await {
            error!(error = %e, "Failed to ack message");
        }
    }

    async fn requeue(&self, delivery: &Delivery) -> Outcome {
        self.metrics.job_requeued();
        if let Err(e) = delivery.nack(true).await {
            error!(error = %e, "Failed to requeue message");
        }
        Outcome::Requeued
    }
}

/// Sleep for `delay`. Returns `false` when shutdown was requested first.
async fn backoff(delay: Duration, shutdown: Option<&mut watch::Receiver<bool>>) -> bool {
    let Some(shutdown) = shutdown else {
        tokio::time::sleep(delay).await;
        return true;
    };
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = shutdown.wait_for(|stop| *stop) => false,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
