//! Queue Worker Framework
//!
//! Long-running consumers for named, durable queues.
//!
//! ## Features
//!
//! - **Transports**: RabbitMQ (`lapin`) and an in-memory broker for tests
//! - **Serial workers**: one subscription per worker, prefetch 1 by default
//! - **Outcome-driven settling**: ack, bounded retry, dead-letter or reject
//! - **Per-message scopes**: fresh unit of work for every delivery
//! - **Periodic tasks**: cron scheduling with a skip-if-running guard
//! - **Prometheus metrics**
//!
//! ## Example
//!
//! ```ignore
//! use queue_worker::{QueueDef, QueueWorker, WorkerConfig};
//!
//! struct EmailQueue;
//! impl QueueDef for EmailQueue {
//!     const QUEUE_NAME: &'static str = "email-mq";
//! }
//!
//! let config = WorkerConfig::from_queue_def::<EmailQueue>();
//! let worker = QueueWorker::new(transport, processor, config);
//! worker.run(shutdown_rx).await?;
//! ```

mod config;
mod dlq;
mod error;
pub mod metrics;
pub mod periodic;
mod producer;
mod registry;
mod scope;
pub mod transport;
mod worker;

pub use config::{RetryPolicy, WorkerConfig};
pub use dlq::{DeadLetterEntry, DeadLetterPublisher};
pub use error::{ErrorCategory, QueueError};
pub use metrics::{QueueMetrics, init_metrics};
pub use periodic::{NonOverlapping, PeriodicTask, TickOutcome};
pub use producer::QueueProducer;
pub use registry::{DLQ_SUFFIX, QueueDef, QueueName, dlq_name};
pub use scope::{ScopeFactory, Scoped, ScopedHandler, UnitOfWork};
pub use transport::memory::{self, InMemoryTransport};
#[cfg(feature = "rabbitmq")]
pub use transport::rabbitmq::{RabbitMqConfig, RabbitMqTransport};
pub use transport::{Acknowledger, Delivery, OutgoingMessage, QueueTransport, Subscription};
pub use worker::{Outcome, QueueJob, QueueProcessor, QueueWorker};
