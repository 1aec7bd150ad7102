//! Downstream collaborators the handlers and the scanner call.
//!
//! Each is a single async request/response per message. HTTP
//! implementations live in [`crate::clients`].

use crate::error::ServiceResult;
use crate::models::{EmailSend, NotificationCreate, OrderCreate, UpcomingEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailService: Send + Sync {
    async fn send(&self, email: &EmailSend) -> ServiceResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Store the notification and push it to the user's open sessions
    async fn create(&self, notification: &NotificationCreate) -> ServiceResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderService: Send + Sync {
    async fn create_order(&self, order: &OrderCreate) -> ServiceResult<()>;
}

/// Search index maintenance. `index_*` re-fetches the entity and indexes it
/// in full.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchIndexService: Send + Sync {
    async fn index_museum(&self, id: Uuid) -> ServiceResult<()>;

    async fn index_artifact(&self, id: Uuid) -> ServiceResult<()>;

    async fn index_event(&self, id: Uuid) -> ServiceResult<()>;

    async fn index_tour_online(&self, id: Uuid) -> ServiceResult<()>;

    async fn delete_from_index(&self, id: Uuid) -> ServiceResult<()>;
}

/// Read access to scheduled events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Published events with `from <= start_time <= to`, each with its
    /// confirmed participants.
    async fn find_published_starting_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ServiceResult<Vec<UpcomingEvent>>;
}

/// The downstream services available inside a scope.
#[derive(Clone)]
pub struct Collaborators {
    pub mail: Arc<dyn MailService>,
    pub notifications: Arc<dyn NotificationService>,
    pub orders: Arc<dyn OrderService>,
    pub search: Arc<dyn SearchIndexService>,
}
