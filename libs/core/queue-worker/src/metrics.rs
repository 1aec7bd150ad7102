//! Prometheus metrics for queue workers

use crate::error::{ErrorCategory, QueueError};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Install the Prometheus recorder once per process.
///
/// With `listen` set, the exporter serves `/metrics` on that address.
/// Later calls are no-ops.
pub fn init_metrics(listen: Option<SocketAddr>) -> Result<(), QueueError> {
    INSTALLED
        .get_or_try_init(|| {
            let builder = PrometheusBuilder::new();
            match listen {
                Some(addr) => {
                    builder
                        .with_http_listener(addr)
                        .install()
                        .map_err(|e| QueueError::Config(format!("metrics exporter: {}", e)))?;
                    info!(%addr, "Prometheus exporter listening");
                }
                None => {
                    builder
                        .install_recorder()
                        .map_err(|e| QueueError::Config(format!("metrics recorder: {}", e)))?;
                    info!("Prometheus recorder installed");
                }
            }
            Ok(())
        })
        .map(|_| ())
}

/// Counter for ticks skipped because the previous run was still going.
pub fn periodic_tick_skipped(task: &'static str) {
    counter!("periodic_ticks_skipped_total", "task" => task).increment(1);
}

/// Per-worker metrics helper
#[derive(Clone)]
pub struct QueueMetrics {
    queue: String,
    processor: String,
}

impl QueueMetrics {
    pub fn new(queue: impl Into<String>, processor: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            processor: processor.into(),
        }
    }

    fn count(&self, name: &'static str) {
        counter!(
            name,
            "queue" => self.queue.clone(),
            "processor" => self.processor.clone()
        )
        .increment(1);
    }

    pub fn job_received(&self) {
        self.count("queue_messages_received_total");
    }

    pub fn job_processed(&self, duration: Duration) {
        self.count("queue_messages_acked_total");
        histogram!(
            "queue_message_duration_seconds",
            "queue" => self.queue.clone(),
            "processor" => self.processor.clone()
        )
        .record(duration.as_secs_f64());
    }

    pub fn job_failed(&self, category: ErrorCategory) {
        counter!(
            "queue_messages_failed_total",
            "queue" => self.queue.clone(),
            "processor" => self.processor.clone(),
            "category" => category.as_ref().to_string()
        )
        .increment(1);
    }

    pub fn job_retried(&self) {
        self.count("queue_messages_retried_total");
    }

    pub fn job_dead_lettered(&self) {
        self.count("queue_messages_dead_lettered_total");
    }

    pub fn job_rejected(&self) {
        self.count("queue_messages_rejected_total");
    }

    pub fn job_requeued(&self) {
        self.count("queue_messages_requeued_total");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_labels() {
        let metrics = QueueMetrics::new("index-mq", "IndexHandler");
        assert_eq!(metrics.queue, "index-mq");
        assert_eq!(metrics.processor, "IndexHandler");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let metrics = QueueMetrics::new("email-mq", "EmailHandler");
        metrics.job_received();
        metrics.job_failed(ErrorCategory::Transient);
        metrics.job_processed(Duration::from_millis(3));
        periodic_tick_skipped("scanner");
    }
}
