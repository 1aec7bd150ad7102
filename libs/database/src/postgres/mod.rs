//! PostgreSQL connector
//!
//! Connection pool setup, connect-with-retry and a `SELECT 1` health check.

mod config;
mod connector;
mod health;

pub use config::PostgresConfig;
pub use connector::connect_from_config_with_retry;
pub use health::check_health;

pub use sea_orm::{ConnectOptions, DatabaseConnection, DbErr};
