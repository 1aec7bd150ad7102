//! Periodic tasks that never overlap.
//!
//! [`NonOverlapping`] holds a single-slot guard: when a tick fires while the
//! previous run is still going, the tick is skipped with a warning.
//! [`schedule`] registers the guarded task on a `tokio-cron-scheduler`
//! scheduler.

use crate::error::QueueError;
use crate::metrics;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, warn};
use uuid::Uuid;

#[async_trait]
pub trait PeriodicTask: Send + Sync + 'static {
    async fn run_once(&self) -> Result<(), QueueError>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Completed,
    Failed,
    Skipped,
}

pub struct NonOverlapping<T> {
    task: Arc<T>,
    running: Arc<Mutex<()>>,
}

impl<T> Clone for NonOverlapping<T> {
    fn clone(&self) -> Self {
        Self {
            task: Arc::clone(&self.task),
            running: Arc::clone(&self.running),
        }
    }
}

impl<T: PeriodicTask> NonOverlapping<T> {
    pub fn new(task: Arc<T>) -> Self {
        Self {
            task,
            running: Arc::new(Mutex::new(())),
        }
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub async fn tick(&self) -> TickOutcome {
        let Ok(_guard) = self.running.try_lock() else {
            warn!(task = self.task.name(), "Previous run still in progress, skipping tick");
            metrics::periodic_tick_skipped(self.task.name());
            return TickOutcome::Skipped;
        };

        match self.task.run_once().await {
            Ok(()) => {
                debug!(task = self.task.name(), "Periodic run completed");
                TickOutcome::Completed
            }
            Err(e) => {
                error!(task = self.task.name(), error = %e, "Periodic run failed");
                TickOutcome::Failed
            }
        }
    }
}

/// Register `runner` on `scheduler` with a six-field cron expression
/// (`sec min hour day month weekday`).
pub async fn schedule<T: PeriodicTask>(
    scheduler: &JobScheduler,
    cron: &str,
    runner: NonOverlapping<T>,
) -> Result<Uuid, QueueError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let runner = runner.clone();
        Box::pin(async move {
            runner.tick().await;
        })
    })
    .map_err(|e| QueueError::Config(format!("invalid schedule '{}': {}", cron, e)))?;

    scheduler
        .add(job)
        .await
        .map_err(|e| QueueError::Config(format!("failed to schedule job: {}", e)))
}
