//! Queue error types and error categorization
//!
//! The category decides what the worker does with a failed delivery:
//! - **Transient**: republish with an incremented retry count after a backoff
//! - **Permanent**: dead-letter immediately
//! - **RateLimited**: like transient, with a longer backoff

use std::time::Duration;
use strum::{AsRefStr, Display};
use thiserror::Error;

/// Category of error for determining retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    Transient,
    Permanent,
    RateLimited,
}

impl ErrorCategory {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorCategory::Permanent)
    }

    /// Multiplier applied to the policy's base delay
    fn delay_factor(&self) -> u32 {
        match self {
            ErrorCategory::Transient => 1,
            ErrorCategory::Permanent => 0,
            ErrorCategory::RateLimited => 5,
        }
    }

    /// Exponential backoff for the given retry count, capped at `max`.
    pub fn backoff_delay(&self, retry_count: u32, base: Duration, max: Duration) -> Duration {
        let factor = self.delay_factor();
        if factor == 0 {
            return Duration::ZERO;
        }
        let exp = 2u32.saturating_pow(retry_count.min(16));
        base.saturating_mul(factor)
            .saturating_mul(exp)
            .min(max.saturating_mul(factor))
    }
}

/// Errors raised by transports, producers and processors.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Broker connection, channel or confirm failure
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Handler failure carrying its own category
    #[error("Processing error: {message}")]
    Processing {
        message: String,
        category: ErrorCategory,
    },

    /// The handler panicked; the payload message is kept for the logs
    #[error("Handler panicked: {0}")]
    Panicked(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl QueueError {
    pub fn transient(message: impl Into<String>) -> Self {
        QueueError::Processing {
            message: message.into(),
            category: ErrorCategory::Transient,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        QueueError::Processing {
            message: message.into(),
            category: ErrorCategory::Permanent,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        QueueError::Processing {
            message: message.into(),
            category: ErrorCategory::RateLimited,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            QueueError::Transport(_) => ErrorCategory::Transient,
            QueueError::Serialization(_) => ErrorCategory::Permanent,
            QueueError::Processing { category, .. } => *category,
            QueueError::Panicked(_) => ErrorCategory::Transient,
            QueueError::Config(_) => ErrorCategory::Permanent,
        }
    }

    /// Whether a delivery that already carries `retry_count` retries may be retried again.
    pub fn should_retry(&self, retry_count: u32, max_retries: u32) -> bool {
        self.category().is_retryable() && retry_count < max_retries
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::Serialization(err.to_string())
    }
}

#[cfg(feature = "rabbitmq")]
impl From<lapin::Error> for QueueError {
    fn from(err: lapin::Error) -> Self {
        QueueError::Transport(err.to_string())
    }
}
