//! PostgreSQL connectivity for the workers.
//!
//! # Features
//!
//! - `postgres` (default): SeaORM connection pool, connect-with-retry and health check
//! - `config`: `core_config::FromEnv` for [`postgres::PostgresConfig`]
//!
//! ```ignore
//! use database::postgres::{PostgresConfig, connect_from_config_with_retry};
//!
//! let db = connect_from_config_with_retry(PostgresConfig::new(url), None).await?;
//! ```
//!
//! [`common::retry_with_backoff`] is storage-agnostic; the worker binary also
//! uses it for the broker connection.

pub mod common;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use common::{DatabaseError, DatabaseResult, RetryConfig, retry_with_backoff};
