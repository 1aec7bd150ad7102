//! Event-start notifier.
//!
//! Once a minute, finds published events starting `lookahead` from now
//! (within a `tolerance` window ending at that instant) and queues one
//! [`NotificationCreate`] per confirmed participant on `notification-mq`.
//! A failed publish is logged and counted; the scan moves on to the next
//! participant.

use crate::models::{NotificationCreate, UpcomingEvent};
use crate::queues::NotificationQueue;
use crate::scope::MuseumScope;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use core_config::{ConfigError, FromEnv, env_or_default, env_parse};
use queue_worker::{PeriodicTask, QueueError, QueueProducer, QueueTransport, ScopeFactory, UnitOfWork};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
    /// Six-field cron expression (seconds first)
    pub schedule: String,
    pub lookahead: Duration,
    pub tolerance: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            schedule: "0 * * * * *".to_string(),
            lookahead: Duration::minutes(30),
            tolerance: Duration::minutes(1),
        }
    }
}

impl FromEnv for ScannerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            schedule: env_or_default("SCANNER_SCHEDULE", "0 * * * * *"),
            lookahead: Duration::minutes(env_parse("SCANNER_LOOKAHEAD_MINUTES", 30)?),
            tolerance: Duration::minutes(env_parse("SCANNER_TOLERANCE_MINUTES", 1)?),
        })
    }
}

/// `[now + lookahead - tolerance, now + lookahead]`
pub fn notification_window(
    now: DateTime<Utc>,
    lookahead: Duration,
    tolerance: Duration,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let target = now + lookahead;
    (target - tolerance, target)
}

/// Result of one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub events: usize,
    pub published: usize,
    pub failed: usize,
}

pub struct EventStartNotifier<F> {
    factory: Arc<F>,
    producer: QueueProducer,
    config: ScannerConfig,
}

impl<F> EventStartNotifier<F>
where
    F: ScopeFactory,
    F::Scope: MuseumScope,
{
    pub fn new(factory: Arc<F>, transport: Arc<dyn QueueTransport>, config: ScannerConfig) -> Self {
        Self {
            factory,
            producer: QueueProducer::from_queue_def::<NotificationQueue>(transport),
            config,
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Scan as if the clock read `now`.
    pub async fn scan_at(&self, now: DateTime<Utc>) -> Result<ScanReport, QueueError> {
        let (from, to) = notification_window(now, self.config.lookahead, self.config.tolerance);
        let events = self.load_events(from, to).await?;

        let mut report = ScanReport {
            events: events.len(),
            ..ScanReport::default()
        };

        for event in &events {
            debug!(
                event_id = %event.id,
                participants = event.participant_ids.len(),
                "Event starting soon"
            );

            for user_id in &event.participant_ids {
                let notification = self.start_notification(event, *user_id);
                match self.producer.send(&notification).await {
                    Ok(()) => report.published += 1,
                    Err(e) => {
                        report.failed += 1;
                        error!(
                            event_id = %event.id,
                            user_id = %user_id,
                            error = %e,
                            "Failed to queue event start notification"
                        );
                    }
                }
            }
        }

        if report.events > 0 {
            info!(
                events = report.events,
                published = report.published,
                failed = report.failed,
                window_start = %from,
                window_end = %to,
                "Event start scan finished"
            );
        }
        Ok(report)
    }

    // The read runs in its own scope, released before any publishing.
    async fn load_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<UpcomingEvent>, QueueError> {
        let scope = self.factory.begin().await?;

        match scope.events().find_published_starting_between(from, to).await {
            Ok(events) => {
                scope.commit().await?;
                Ok(events)
            }
            Err(e) => {
                if let Err(rollback_err) = scope.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed event query failed");
                }
                Err(e.into())
            }
        }
    }

    fn start_notification(&self, event: &UpcomingEvent, user_id: Uuid) -> NotificationCreate {
        NotificationCreate {
            title: format!("{} starts soon", event.title),
            message: format!(
                "\"{}\" at {} starts in {} minutes.",
                event.title,
                event.location,
                self.config.lookahead.num_minutes()
            ),
            user_id,
            metadata: json!({
                "eventId": event.id,
                "eventTitle": event.title,
                "location": event.location,
                "startTime": event.start_time.to_rfc3339(),
            }),
        }
    }
}

#[async_trait]
impl<F> PeriodicTask for EventStartNotifier<F>
where
    F: ScopeFactory,
    F::Scope: MuseumScope,
{
    async fn run_once(&self) -> Result<(), QueueError> {
        self.scan_at(Utc::now()).await.map(|_| ())
    }

    fn name(&self) -> &'static str {
        "event-start-notifier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EventStatus;
    use crate::error::ServiceError;
    use crate::services::MockEventRepository;
    use crate::testing::{FixedEvents, TestScope, TestScopeFactory};
    use queue_worker::{InMemoryTransport, OutgoingMessage, Subscription};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use test_utils::TestDataBuilder;

    fn event(builder: &TestDataBuilder, n: u64, start: DateTime<Utc>, participants: usize) -> UpcomingEvent {
        UpcomingEvent {
            id: builder.uuid(n * 100),
            title: format!("Event {}", n),
            location: "East Wing".into(),
            start_time: start,
            participant_ids: (1..=participants as u64).map(|p| builder.uuid(n * 100 + p)).collect(),
        }
    }

    fn notifier(events: FixedEvents, transport: Arc<dyn QueueTransport>) -> EventStartNotifier<TestScopeFactory> {
        EventStartNotifier::new(
            Arc::new(TestScopeFactory::new(events)),
            transport,
            ScannerConfig::default(),
        )
    }

    fn queued(transport: &InMemoryTransport) -> Vec<NotificationCreate> {
        transport
            .ready_messages("notification-mq")
            .iter()
            .map(|m| serde_json::from_slice(&m.body).unwrap())
            .collect()
    }

    #[test]
    fn test_window_bounds() {
        let now = TestDataBuilder::new(0).now();
        let (from, to) = notification_window(now, Duration::minutes(30), Duration::minutes(1));
        assert_eq!(to, now + Duration::minutes(30));
        assert_eq!(from, now + Duration::minutes(29));
    }

    #[tokio::test]
    async fn test_includes_event_at_lookahead_and_excludes_later_one() {
        let builder = TestDataBuilder::from_test_name("window");
        let now = builder.now();
        let soon = event(&builder, 1, now + Duration::minutes(30), 1);
        let later = event(&builder, 2, now + Duration::minutes(45), 1);

        let transport = InMemoryTransport::new();
        let scanner = notifier(
            FixedEvents::default()
                .with(soon.clone(), EventStatus::Published)
                .with(later, EventStatus::Published),
            Arc::new(transport.clone()),
        );

        let report = scanner.scan_at(now).await.unwrap();
        assert_eq!(report, ScanReport { events: 1, published: 1, failed: 0 });

        let notifications = queued(&transport);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].metadata["eventId"], json!(soon.id));
    }

    #[tokio::test]
    async fn test_unpublished_events_are_ignored() {
        let builder = TestDataBuilder::from_test_name("drafts");
        let now = builder.now();
        let transport = InMemoryTransport::new();
        let scanner = notifier(
            FixedEvents::default()
                .with(event(&builder, 1, now + Duration::minutes(30), 2), EventStatus::Draft)
                .with(event(&builder, 2, now + Duration::minutes(30), 2), EventStatus::Cancelled),
            Arc::new(transport.clone()),
        );

        let report = scanner.scan_at(now).await.unwrap();
        assert_eq!(report, ScanReport::default());
        assert_eq!(transport.depth("notification-mq"), 0);
    }

    #[tokio::test]
    async fn test_one_notification_per_confirmed_participant() {
        let builder = TestDataBuilder::from_test_name("participants");
        let now = builder.now();
        let upcoming = event(&builder, 7, now + Duration::minutes(30), 3);

        let transport = InMemoryTransport::new();
        let scanner = notifier(
            FixedEvents::default().with(upcoming.clone(), EventStatus::Published),
            Arc::new(transport.clone()),
        );

        let report = scanner.scan_at(now).await.unwrap();
        assert_eq!(report.published, 3);

        let notifications = queued(&transport);
        let recipients: HashSet<Uuid> = notifications.iter().map(|n| n.user_id).collect();
        let expected: HashSet<Uuid> = upcoming.participant_ids.iter().copied().collect();
        assert_eq!(recipients, expected);

        for notification in &notifications {
            assert_eq!(notification.metadata["eventId"], json!(upcoming.id));
            assert_eq!(notification.metadata["location"], "East Wing");
            assert!(notification.message.contains("Event 7"));
            assert!(notification.message.contains("East Wing"));
        }
    }

    /// Fails the n-th publish, delegates everything else.
    struct FailNth {
        inner: InMemoryTransport,
        fail_at: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QueueTransport for FailNth {
        async fn declare(&self, queue: &str) -> Result<(), QueueError> {
            self.inner.declare(queue).await
        }

        async fn publish(&self, queue: &str, message: OutgoingMessage) -> Result<(), QueueError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_at {
                return Err(QueueError::Transport("channel closed".into()));
            }
            self.inner.publish(queue, message).await
        }

        async fn subscribe(
            &self,
            queue: &str,
            consumer_tag: &str,
            prefetch: u16,
        ) -> Result<Subscription, QueueError> {
            self.inner.subscribe(queue, consumer_tag, prefetch).await
        }

        fn provider_name(&self) -> &'static str {
            "fail-nth"
        }
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_stop_scan() {
        let builder = TestDataBuilder::from_test_name("flaky");
        let now = builder.now();
        let inner = InMemoryTransport::new();
        let transport = Arc::new(FailNth {
            inner: inner.clone(),
            fail_at: 2,
            calls: AtomicUsize::new(0),
        });

        let scanner = notifier(
            FixedEvents::default().with(
                event(&builder, 1, now + Duration::minutes(30), 3),
                EventStatus::Published,
            ),
            transport,
        );

        let report = scanner.scan_at(now).await.unwrap();
        assert_eq!(report, ScanReport { events: 1, published: 2, failed: 1 });
        assert_eq!(inner.depth("notification-mq"), 2);
    }

    struct BrokenFactory;

    #[async_trait]
    impl ScopeFactory for BrokenFactory {
        type Scope = TestScope;

        async fn begin(&self) -> Result<TestScope, QueueError> {
            let mut events = MockEventRepository::new();
            events
                .expect_find_published_starting_between()
                .returning(|_, _| Err(ServiceError::Database("connection reset".into())));
            Ok(TestScope::builder().events(events).build())
        }
    }

    #[tokio::test]
    async fn test_query_failure_is_reported() {
        let transport = InMemoryTransport::new();
        let scanner = EventStartNotifier::new(
            Arc::new(BrokenFactory),
            Arc::new(transport.clone()),
            ScannerConfig::default(),
        );

        assert!(scanner.run_once().await.is_err());
        assert_eq!(transport.depth("notification-mq"), 0);
    }

    #[tokio::test]
    async fn test_each_scan_opens_its_own_scope() {
        let factory = Arc::new(TestScopeFactory::new(FixedEvents::default()));
        let scanner = EventStartNotifier::new(
            Arc::clone(&factory),
            Arc::new(InMemoryTransport::new()),
            ScannerConfig::default(),
        );

        scanner.run_once().await.unwrap();
        scanner.run_once().await.unwrap();
        assert_eq!(factory.opened.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn test_config_from_env() {
        temp_env::with_vars(
            [
                ("SCANNER_SCHEDULE", Some("*/30 * * * * *")),
                ("SCANNER_LOOKAHEAD_MINUTES", Some("15")),
                ("SCANNER_TOLERANCE_MINUTES", None),
            ],
            || {
                let config = ScannerConfig::from_env().unwrap();
                assert_eq!(config.schedule, "*/30 * * * * *");
                assert_eq!(config.lookahead, Duration::minutes(15));
                assert_eq!(config.tolerance, Duration::minutes(1));
            },
        );
    }

    #[test]
    fn test_config_rejects_garbage() {
        temp_env::with_var("SCANNER_LOOKAHEAD_MINUTES", Some("soon"), || {
            assert!(matches!(
                ScannerConfig::from_env(),
                Err(ConfigError::ParseError { .. })
            ));
        });
    }
}
