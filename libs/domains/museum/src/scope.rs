//! Per-message scope for the museum workers.
//!
//! [`DbScopeFactory`] opens one database transaction per delivery and hands
//! the handler a [`DbScope`] that also carries the downstream services. The
//! scope is committed or rolled back by `queue_worker::Scoped` and then
//! dropped; nothing in it is shared with the next message.

use crate::entity::{EventStatus, ParticipantStatus, event, event_participant};
use crate::error::{ServiceError, ServiceResult};
use crate::models::UpcomingEvent;
use crate::services::{Collaborators, EventRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use queue_worker::{QueueError, ScopeFactory, UnitOfWork};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// What a museum handler can reach from inside its scope.
pub trait MuseumScope: UnitOfWork {
    fn events(&self) -> &dyn EventRepository;

    fn services(&self) -> &Collaborators;
}

pub struct DbScopeFactory {
    db: DatabaseConnection,
    services: Arc<Collaborators>,
}

impl DbScopeFactory {
    pub fn new(db: DatabaseConnection, services: Collaborators) -> Self {
        Self {
            db,
            services: Arc::new(services),
        }
    }
}

#[async_trait]
impl ScopeFactory for DbScopeFactory {
    type Scope = DbScope;

    async fn begin(&self) -> Result<DbScope, QueueError> {
        let tx = self.db.begin().await.map_err(ServiceError::from)?;
        Ok(DbScope {
            tx,
            services: Arc::clone(&self.services),
        })
    }
}

pub struct DbScope {
    tx: DatabaseTransaction,
    services: Arc<Collaborators>,
}

#[async_trait]
impl UnitOfWork for DbScope {
    async fn commit(self) -> Result<(), QueueError> {
        self.tx.commit().await.map_err(ServiceError::from)?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), QueueError> {
        self.tx.rollback().await.map_err(ServiceError::from)?;
        Ok(())
    }
}

impl MuseumScope for DbScope {
    fn events(&self) -> &dyn EventRepository {
        self
    }

    fn services(&self) -> &Collaborators {
        &self.services
    }
}

#[async_trait]
impl EventRepository for DbScope {
    async fn find_published_starting_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ServiceResult<Vec<UpcomingEvent>> {
        let events = event::Entity::find()
            .filter(event::Column::Status.eq(EventStatus::Published))
            .filter(event::Column::StartTime.between(from, to))
            .order_by_asc(event::Column::StartTime)
            .all(&self.tx)
            .await?;

        if events.is_empty() {
            return Ok(Vec::new());
        }

        let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        let participants = event_participant::Entity::find()
            .filter(event_participant::Column::EventId.is_in(event_ids))
            .filter(event_participant::Column::Status.eq(ParticipantStatus::Confirmed))
            .all(&self.tx)
            .await?;

        let mut by_event: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for participant in participants {
            by_event
                .entry(participant.event_id)
                .or_default()
                .push(participant.user_id);
        }

        Ok(events
            .into_iter()
            .map(|e| UpcomingEvent {
                participant_ids: by_event.remove(&e.id).unwrap_or_default(),
                id: e.id,
                title: e.title,
                location: e.location,
                start_time: e.start_time.with_timezone(&Utc),
            })
            .collect())
    }
}
