//! Error types for the museum domain.

use core_config::ConfigError;
use queue_worker::QueueError;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Service unreachable, timed out or answered 5xx
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The service refused the request; resending it will not help
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl ServiceError {
    /// Classify an unsuccessful HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => ServiceError::NotFound(message),
            429 => ServiceError::RateLimited(message),
            500..=599 => ServiceError::Unavailable(format!("HTTP {}: {}", status, message)),
            _ => ServiceError::Rejected { status, message },
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ServiceError::from_status(status.as_u16(), err.to_string()),
            None => ServiceError::Unavailable(err.to_string()),
        }
    }
}

impl From<sea_orm::DbErr> for ServiceError {
    fn from(err: sea_orm::DbErr) -> Self {
        ServiceError::Database(err.to_string())
    }
}

impl From<ServiceError> for QueueError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(_) | ServiceError::Database(_) => {
                QueueError::transient(err.to_string())
            }
            ServiceError::RateLimited(_) => QueueError::rate_limited(err.to_string()),
            ServiceError::Rejected { .. } | ServiceError::NotFound(_) => {
                QueueError::permanent(err.to_string())
            }
        }
    }
}

/// Errors raised while assembling the domain outside message handling.
#[derive(Debug, Error)]
pub enum MuseumError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

pub type MuseumResult<T> = Result<T, MuseumError>;
