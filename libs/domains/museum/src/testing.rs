//! Test doubles shared by the unit tests of this crate.

use crate::entity::EventStatus;
use crate::error::ServiceResult;
use crate::models::UpcomingEvent;
use crate::scope::MuseumScope;
use crate::services::{
    Collaborators, EventRepository, MailService, MockEventRepository, MockMailService,
    MockNotificationService, MockOrderService, MockSearchIndexService, NotificationService,
    OrderService, SearchIndexService,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use queue_worker::{QueueError, ScopeFactory, UnitOfWork};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Collaborators whose every call panics.
pub(crate) fn collaborators() -> Collaborators {
    TestScope::builder().build().services
}

pub(crate) struct TestScope {
    events: Arc<dyn EventRepository>,
    services: Collaborators,
}

impl TestScope {
    pub(crate) fn builder() -> TestScopeBuilder {
        TestScopeBuilder::default()
    }
}

#[async_trait]
impl UnitOfWork for TestScope {
    async fn commit(self) -> Result<(), QueueError> {
        Ok(())
    }

    async fn rollback(self) -> Result<(), QueueError> {
        Ok(())
    }
}

impl MuseumScope for TestScope {
    fn events(&self) -> &dyn EventRepository {
        self.events.as_ref()
    }

    fn services(&self) -> &Collaborators {
        &self.services
    }
}

#[derive(Default)]
pub(crate) struct TestScopeBuilder {
    events: Option<Arc<dyn EventRepository>>,
    mail: Option<MockMailService>,
    notifications: Option<MockNotificationService>,
    orders: Option<MockOrderService>,
    search: Option<MockSearchIndexService>,
}

impl TestScopeBuilder {
    pub(crate) fn events(mut self, events: impl EventRepository + 'static) -> Self {
        self.events = Some(Arc::new(events));
        self
    }

    pub(crate) fn mail(mut self, mail: MockMailService) -> Self {
        self.mail = Some(mail);
        self
    }

    pub(crate) fn notifications(mut self, notifications: MockNotificationService) -> Self {
        self.notifications = Some(notifications);
        self
    }

    pub(crate) fn orders(mut self, orders: MockOrderService) -> Self {
        self.orders = Some(orders);
        self
    }

    pub(crate) fn search(mut self, search: MockSearchIndexService) -> Self {
        self.search = Some(search);
        self
    }

    pub(crate) fn build(self) -> TestScope {
        let mail: Arc<dyn MailService> = Arc::new(self.mail.unwrap_or_default());
        let notifications: Arc<dyn NotificationService> =
            Arc::new(self.notifications.unwrap_or_default());
        let orders: Arc<dyn OrderService> = Arc::new(self.orders.unwrap_or_default());
        let search: Arc<dyn SearchIndexService> = Arc::new(self.search.unwrap_or_default());

        TestScope {
            events: self
                .events
                .unwrap_or_else(|| Arc::new(MockEventRepository::new())),
            services: Collaborators {
                mail,
                notifications,
                orders,
                search,
            },
        }
    }
}

/// Events held in memory, filtered the way the database query filters them.
#[derive(Clone, Default)]
pub(crate) struct FixedEvents {
    events: Vec<(UpcomingEvent, EventStatus)>,
}

impl FixedEvents {
    pub(crate) fn with(mut self, event: UpcomingEvent, status: EventStatus) -> Self {
        self.events.push((event, status));
        self
    }
}

#[async_trait]
impl EventRepository for FixedEvents {
    async fn find_published_starting_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ServiceResult<Vec<UpcomingEvent>> {
        Ok(self
            .events
            .iter()
            .filter(|(e, status)| {
                *status == EventStatus::Published && e.start_time >= from && e.start_time <= to
            })
            .map(|(e, _)| e.clone())
            .collect())
    }
}

/// Hands out a fresh [`TestScope`] over the same events for every `begin`.
pub(crate) struct TestScopeFactory {
    events: FixedEvents,
    pub(crate) opened: AtomicU32,
}

impl TestScopeFactory {
    pub(crate) fn new(events: FixedEvents) -> Self {
        Self {
            events,
            opened: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ScopeFactory for TestScopeFactory {
    type Scope = TestScope;

    async fn begin(&self) -> Result<TestScope, QueueError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(TestScope::builder().events(self.events.clone()).build())
    }
}
