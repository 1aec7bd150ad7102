//! Museum Workers
//!
//! Headless service that consumes the platform queues and runs the
//! event-start scanner.
//!
//! ## Architecture
//!
//! ```text
//! RabbitMQ ─┬─ notification-mq ─→ QueueWorker<NotificationCreate> ─┐
//!           ├─ email-mq        ─→ QueueWorker<EmailSend>          ├─→ DbScope per message
//!           ├─ order-mq        ─→ QueueWorker<OrderCreate>        │     (Postgres tx + services)
//!           └─ index-mq        ─→ QueueWorker<IndexMessage>       ─┘
//!
//! JobScheduler (every minute) ─→ EventStartNotifier ─→ notification-mq
//! ```
//!
//! Each worker is its own task with its own subscription (prefetch 1). A
//! worker that loses its subscription stops the whole process with an error
//! so the supervisor restarts it.

pub mod config;

use clap::{Parser, Subcommand};
use config::Config;
use core_config::tracing::init_tracing;
use core_config::{Environment, FromEnv};
use database::postgres::{DatabaseConnection, check_health, connect_from_config_with_retry};
use database::{RetryConfig, retry_with_backoff};
use domain_museum::{
    DbScopeFactory, EmailHandler, EmailQueue, EmailSend, EventStartNotifier, IndexHandler,
    IndexMessage, IndexQueue, NotificationCreate, NotificationHandler, NotificationQueue,
    OrderCreate, OrderHandler, OrderQueue,
};
use eyre::{Result, WrapErr, eyre};
use queue_worker::periodic::schedule;
use queue_worker::{
    NonOverlapping, QueueDef, QueueError, QueueJob, QueueName, QueueProcessor, QueueTransport,
    QueueWorker, RabbitMqTransport, Scoped, init_metrics,
};
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_cron_scheduler::JobScheduler;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "museum-workers")]
#[command(about = "Queue workers and event-start scanner for the museum platform")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run every worker and the scanner until SIGINT/SIGTERM (default)
    Run,
    /// Run one scanner pass and exit
    ScanOnce,
    /// List the platform queues
    Queues,
}

type WorkerSet = JoinSet<(&'static str, Result<(), QueueError>)>;

/// Entry point behind `main`.
pub async fn run(cli: Cli) -> Result<()> {
    let command = cli.command.unwrap_or(Command::Run);

    if command == Command::Queues {
        print!("{}", queue_table());
        return Ok(());
    }

    let environment = Environment::from_env();
    init_tracing(&environment);

    let config = Config::from_env().wrap_err("Failed to load configuration")?;
    info!(environment = ?config.environment, command = ?command, "Starting museum workers");

    match command {
        Command::Run => run_workers(config).await,
        Command::ScanOnce => scan_once(config).await,
        Command::Queues => Ok(()),
    }
}

/// Queue names, their dead-letter queues and whether anything here
/// consumes them.
pub fn queue_table() -> String {
    let mut table = format!("{:<24} {:<28} {}\n", "QUEUE", "DEAD LETTER", "STATUS");
    for queue in QueueName::all() {
        let status = if queue.is_reserved() { "reserved" } else { "consumed" };
        let _ = writeln!(table, "{:<24} {:<28} {}", queue.name(), queue.dlq(), status);
    }
    table
}

async fn connect(config: &Config) -> Result<(DatabaseConnection, Arc<RabbitMqTransport>)> {
    info!("Connecting to PostgreSQL...");
    let db = connect_from_config_with_retry(config.database.clone(), None)
        .await
        .wrap_err("Failed to connect to PostgreSQL")?;
    check_health(&db)
        .await
        .wrap_err("PostgreSQL health check failed")?;

    info!("Connecting to RabbitMQ...");
    let transport = retry_with_backoff(
        "rabbitmq",
        || RabbitMqTransport::connect(&config.rabbitmq),
        RetryConfig::default(),
    )
    .await
    .wrap_err("Failed to connect to RabbitMQ")?;

    Ok((db, Arc::new(transport)))
}

/// Declare every platform queue, reserved ones included, so producers
/// elsewhere never publish into a missing queue.
async fn declare_queues(transport: &dyn QueueTransport) -> Result<()> {
    if !transport.is_healthy() {
        return Err(eyre!("{} transport is not connected", transport.provider_name()));
    }
    for queue in QueueName::all() {
        transport
            .declare(queue.name())
            .await
            .wrap_err_with(|| format!("Failed to declare {}", queue))?;
        info!(queue = queue.name(), reserved = queue.is_reserved(), "Queue declared");
    }
    Ok(())
}

fn spawn_worker<Q, J, P>(
    workers: &mut WorkerSet,
    transport: Arc<dyn QueueTransport>,
    processor: P,
    config: &Config,
    shutdown: watch::Receiver<bool>,
) where
    Q: QueueDef,
    J: QueueJob,
    P: QueueProcessor<J> + 'static,
{
    let config = config.worker_config::<Q>();
    let worker = QueueWorker::<J, P>::new(transport, processor, config);
    workers.spawn(async move { (Q::QUEUE_NAME, worker.run(shutdown).await) });
}

/// Run all workers and the scanner until shutdown or a fatal worker error.
pub async fn run_workers(config: Config) -> Result<()> {
    init_metrics(config.metrics_addr()).wrap_err("Failed to initialize metrics")?;

    let (db, rabbitmq) = connect(&config).await?;
    let transport: Arc<dyn QueueTransport> = rabbitmq.clone();
    declare_queues(transport.as_ref()).await?;

    let collaborators = config
        .downstream
        .collaborators()
        .wrap_err("Failed to build downstream clients")?;
    let factory = Arc::new(DbScopeFactory::new(db, collaborators));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut workers = WorkerSet::new();
    spawn_worker::<NotificationQueue, NotificationCreate, _>(
        &mut workers,
        Arc::clone(&transport),
        Scoped::new(Arc::clone(&factory), NotificationHandler),
        &config,
        shutdown_rx.clone(),
    );
    spawn_worker::<EmailQueue, EmailSend, _>(
        &mut workers,
        Arc::clone(&transport),
        Scoped::new(Arc::clone(&factory), EmailHandler),
        &config,
        shutdown_rx.clone(),
    );
    spawn_worker::<OrderQueue, OrderCreate, _>(
        &mut workers,
        Arc::clone(&transport),
        Scoped::new(Arc::clone(&factory), OrderHandler),
        &config,
        shutdown_rx.clone(),
    );
    spawn_worker::<IndexQueue, IndexMessage, _>(
        &mut workers,
        Arc::clone(&transport),
        Scoped::new(Arc::clone(&factory), IndexHandler),
        &config,
        shutdown_rx,
    );
    info!(workers = workers.len(), "Workers started");

    let mut scheduler = JobScheduler::new()
        .await
        .map_err(|e| eyre!("Failed to create scheduler: {}", e))?;
    let notifier = EventStartNotifier::new(
        Arc::clone(&factory),
        Arc::clone(&transport),
        config.scanner.clone(),
    );
    schedule(&scheduler, &config.scanner.schedule, NonOverlapping::new(Arc::new(notifier)))
        .await
        .wrap_err("Failed to schedule event-start scanner")?;
    scheduler
        .start()
        .await
        .map_err(|e| eyre!("Failed to start scheduler: {}", e))?;
    info!(schedule = %config.scanner.schedule, "Event-start scanner scheduled");

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = signal_tx.send(true);
    });

    let mut fatal = None;
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((queue, Ok(()))) => info!(queue, "Worker stopped"),
            Ok((queue, Err(e))) => {
                error!(queue, error = %e, "Worker failed, shutting down");
                let _ = shutdown_tx.send(true);
                fatal.get_or_insert_with(|| eyre!("worker for {} failed: {}", queue, e));
            }
            Err(e) => {
                error!(error = %e, "Worker task aborted, shutting down");
                let _ = shutdown_tx.send(true);
                fatal.get_or_insert_with(|| eyre!("worker task aborted: {}", e));
            }
        }
    }

    if let Err(e) = scheduler.shutdown().await {
        warn!(error = %e, "Scheduler shutdown failed");
    }
    if let Err(e) = rabbitmq.close().await {
        warn!(error = %e, "Closing RabbitMQ connection failed");
    }

    match fatal {
        Some(report) => Err(report),
        None => {
            info!("Museum workers stopped");
            Ok(())
        }
    }
}

/// One scanner pass at the current time.
pub async fn scan_once(config: Config) -> Result<()> {
    let (db, rabbitmq) = connect(&config).await?;
    let transport: Arc<dyn QueueTransport> = rabbitmq.clone();
    transport
        .declare(NotificationQueue::QUEUE_NAME)
        .await
        .wrap_err("Failed to declare notification queue")?;

    let collaborators = config
        .downstream
        .collaborators()
        .wrap_err("Failed to build downstream clients")?;
    let notifier = EventStartNotifier::new(
        Arc::new(DbScopeFactory::new(db, collaborators)),
        transport,
        config.scanner.clone(),
    );

    let report = notifier
        .scan_at(chrono::Utc::now())
        .await
        .wrap_err("Event-start scan failed")?;
    info!(
        events = report.events,
        published = report.published,
        failed = report.failed,
        "Scan complete"
    );

    rabbitmq.close().await.wrap_err("Failed to close RabbitMQ connection")?;
    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating shutdown..."),
    }
}
