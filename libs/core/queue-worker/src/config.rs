//! Worker configuration

use crate::registry::{QueueDef, dlq_name};
use std::time::Duration;
use uuid::Uuid;

#[cfg(feature = "config")]
use core_config::{ConfigError, FromEnv, env_parse};

/// Bounded-retry settings shared by every worker in a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Retry immediately, useful in tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// - `WORKER_MAX_RETRIES` (default 3)
/// - `WORKER_RETRY_BASE_DELAY_MS` (default 1000)
/// - `WORKER_RETRY_MAX_DELAY_MS` (default 30000)
#[cfg(feature = "config")]
impl FromEnv for RetryPolicy {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            max_retries: env_parse("WORKER_MAX_RETRIES", 3)?,
            base_delay: Duration::from_millis(env_parse("WORKER_RETRY_BASE_DELAY_MS", 1000)?),
            max_delay: Duration::from_millis(env_parse("WORKER_RETRY_MAX_DELAY_MS", 30_000)?),
        })
    }
}

/// Configuration for one queue worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub queue_name: String,

    pub dlq_name: String,

    /// Consumer tag shown on the broker (auto-generated)
    pub consumer_tag: String,

    /// Unacknowledged deliveries allowed in flight. 1 means strictly serial.
    pub prefetch: u16,

    pub retry: RetryPolicy,

    pub enable_dlq: bool,
}

impl WorkerConfig {
    pub fn from_queue_def<Q: QueueDef>() -> Self {
        Self {
            retry: RetryPolicy {
                max_retries: Q::MAX_RETRIES,
                ..RetryPolicy::default()
            },
            enable_dlq: Q::DLQ_ENABLED,
            ..Self::new(Q::QUEUE_NAME)
        }
    }

    pub fn new(queue_name: impl Into<String>) -> Self {
        let queue_name = queue_name.into();
        Self {
            dlq_name: dlq_name(&queue_name),
            consumer_tag: format!("{}-{}", queue_name, Uuid::new_v4()),
            queue_name,
            prefetch: 1,
            retry: RetryPolicy::default(),
            enable_dlq: true,
        }
    }

    pub fn with_consumer_tag(mut self, tag: impl Into<String>) -> Self {
        self.consumer_tag = tag.into();
        self
    }

    pub fn with_prefetch(mut self, prefetch: u16) -> Self {
        self.prefetch = prefetch.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_dlq(mut self, enable: bool) -> Self {
        self.enable_dlq = enable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OrderQueue;

    impl QueueDef for OrderQueue {
        const QUEUE_NAME: &'static str = "order-mq";
        const MAX_RETRIES: u32 = 5;
    }

    #[test]
    fn test_from_queue_def() {
        let config = WorkerConfig::from_queue_def::<OrderQueue>();

        assert_eq!(config.queue_name, "order-mq");
        assert_eq!(config.dlq_name, "order-mq.dlq");
        assert_eq!(config.prefetch, 1);
        assert_eq!(config.retry.max_retries, 5);
        assert!(config.enable_dlq);
        assert!(config.consumer_tag.starts_with("order-mq-"));
    }

    #[test]
    fn test_builder_pattern() {
        let config = WorkerConfig::new("email-mq")
            .with_consumer_tag("email-1")
            .with_prefetch(0)
            .with_retry(RetryPolicy::immediate(1))
            .with_dlq(false);

        assert_eq!(config.consumer_tag, "email-1");
        assert_eq!(config.prefetch, 1);
        assert_eq!(config.retry.base_delay, Duration::ZERO);
        assert!(!config.enable_dlq);
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_retry_policy_from_env() {
        temp_env::with_vars(
            [
                ("WORKER_MAX_RETRIES", Some("7")),
                ("WORKER_RETRY_BASE_DELAY_MS", Some("250")),
                ("WORKER_RETRY_MAX_DELAY_MS", None),
            ],
            || {
                let policy = RetryPolicy::from_env().unwrap();
                assert_eq!(policy.max_retries, 7);
                assert_eq!(policy.base_delay, Duration::from_millis(250));
                assert_eq!(policy.max_delay, Duration::from_secs(30));
            },
        );
    }
}
