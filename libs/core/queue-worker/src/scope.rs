//! Per-message unit of work.
//!
//! A [`ScopeFactory`] opens a fresh scope for every delivery; the
//! [`Scoped`] adapter commits it when the handler succeeds and rolls it back
//! otherwise. Nothing a handler caches in its scope survives to the next
//! message.

use crate::error::QueueError;
use crate::worker::{QueueJob, QueueProcessor};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

#[async_trait]
pub trait UnitOfWork: Send + Sync + Sized + 'static {
    async fn commit(self) -> Result<(), QueueError>;

    async fn rollback(self) -> Result<(), QueueError>;
}

#[async_trait]
pub trait ScopeFactory: Send + Sync + 'static {
    type Scope: UnitOfWork;

    async fn begin(&self) -> Result<Self::Scope, QueueError>;
}

/// A message handler that works inside a scope.
#[async_trait]
pub trait ScopedHandler<J: QueueJob, S: UnitOfWork>: Send + Sync {
    async fn handle(&self, scope: &S, job: &J) -> Result<(), QueueError>;

    fn name(&self) -> &'static str;
}

/// Adapts a factory and a scoped handler into a [`QueueProcessor`].
pub struct Scoped<F, H> {
    factory: Arc<F>,
    handler: H,
}

impl<F, H> Scoped<F, H> {
    pub fn new(factory: Arc<F>, handler: H) -> Self {
        Self { factory, handler }
    }
}

#[async_trait]
impl<J, F, H> QueueProcessor<J> for Scoped<F, H>
where
    J: QueueJob,
    F: ScopeFactory,
    H: ScopedHandler<J, F::Scope>,
{
    async fn process(&self, job: &J) -> Result<(), QueueError> {
        let scope = self.factory.begin().await?;

        match self.handler.handle(&scope, job).await {
            Ok(()) => scope.commit().await,
            Err(e) => {
                if let Err(rollback_err) = scope.rollback().await {
                    warn!(
                        handler = self.handler.name(),
                        error = %rollback_err,
                        "Rollback failed"
                    );
                }
                Err(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        self.handler.name()
    }
}
