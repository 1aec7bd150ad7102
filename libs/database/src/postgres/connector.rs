use sea_orm::{Database, DatabaseConnection};
use tracing::info;

use super::PostgresConfig;
use crate::common::{DatabaseError, DatabaseResult, RetryConfig, retry_with_backoff};

/// Connect from config, retrying with exponential backoff.
///
/// Used at worker startup where the database may still be coming up.
pub async fn connect_from_config_with_retry(
    config: PostgresConfig,
    retry_config: Option<RetryConfig>,
) -> DatabaseResult<DatabaseConnection> {
    let options = config.into_connect_options();
    let retry_config = retry_config.unwrap_or_default();
    let attempts = retry_config.max_retries + 1;

    let db = retry_with_backoff(
        "postgres",
        || Database::connect(options.clone()),
        retry_config,
    )
    .await
    .map_err(|e| DatabaseError::Unreachable {
        backend: "postgres",
        attempts,
        message: e.to_string(),
    })?;

    info!("Connected to PostgreSQL");
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_connect_gives_up_after_retries() {
        let err = connect_from_config_with_retry(
            PostgresConfig::new("unsupported://localhost/museum"),
            Some(RetryConfig::new().with_max_retries(2).without_jitter()),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            DatabaseError::Unreachable { backend: "postgres", attempts: 3, .. }
        ));
    }
}
