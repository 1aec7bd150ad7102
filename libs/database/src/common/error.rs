/// Failures while bringing up a database for the workers
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Every connection attempt failed
    #[error("{backend} unreachable after {attempts} attempts: {message}")]
    Unreachable {
        backend: &'static str,
        attempts: u32,
        message: String,
    },

    #[error("{backend} health check failed: {message}")]
    Unhealthy {
        backend: &'static str,
        message: String,
    },
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
