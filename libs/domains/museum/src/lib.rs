//! Museum Domain
//!
//! Background processing for the museum platform.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ notification │   │   email-mq   │   │   order-mq   │   │   index-mq   │
//! └──────┬───────┘   └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!        │                  │                  │                  │
//! ┌──────▼──────────────────▼──────────────────▼──────────────────▼───────┐
//! │   QueueWorker + Scoped<DbScopeFactory, *Handler>  (one scope/message) │
//! └──────┬──────────────────┬──────────────────┬──────────────────┬───────┘
//!        │                  │                  │                  │
//!   Notification          Mail              Order            Search index
//!     service            service           service             service
//!
//! ┌──────────────────────┐
//! │ EventStartNotifier   │  every minute → notification-mq
//! └──────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_museum::{DbScopeFactory, IndexHandler, IndexQueue};
//! use queue_worker::{QueueWorker, Scoped, WorkerConfig};
//!
//! let factory = Arc::new(DbScopeFactory::new(db, collaborators));
//! let worker = QueueWorker::new(
//!     transport,
//!     Scoped::new(factory, IndexHandler),
//!     WorkerConfig::from_queue_def::<IndexQueue>(),
//! );
//! ```

pub mod clients;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod presence;
pub mod queues;
pub mod scanner;
pub mod scope;
pub mod services;

#[cfg(test)]
mod testing;

pub use clients::DownstreamConfig;
pub use error::{MuseumError, MuseumResult, ServiceError, ServiceResult};
pub use handlers::{EmailHandler, IndexHandler, NotificationHandler, OrderHandler};
pub use models::{
    EmailSend, IndexAction, IndexEntityType, IndexMessage, NotificationCreate, OrderCreate,
    OrderItem, UpcomingEvent,
};
pub use presence::PresenceRegistry;
pub use queues::{EmailQueue, IndexQueue, NotificationQueue, OrderQueue};
pub use scanner::{EventStartNotifier, ScanReport, ScannerConfig, notification_window};
pub use scope::{DbScope, DbScopeFactory, MuseumScope};
pub use services::{
    Collaborators, EventRepository, MailService, NotificationService, OrderService,
    SearchIndexService,
};
