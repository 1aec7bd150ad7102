use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};
use tracing::debug;

use crate::common::{DatabaseError, DatabaseResult};

/// Run `SELECT 1` against the pool.
///
/// Called once at startup before any worker subscribes, so a misconfigured
/// database fails the process early instead of failing every message.
pub async fn check_health(db: &DatabaseConnection) -> DatabaseResult<()> {
    let stmt = Statement::from_string(DatabaseBackend::Postgres, "SELECT 1".to_owned());
    db.query_one_raw(stmt)
        .await
        .map_err(|e| DatabaseError::Unhealthy {
            backend: "postgres",
            message: e.to_string(),
        })?;

    debug!("PostgreSQL health check passed");
    Ok(())
}
