use crate::models::NotificationCreate;
use crate::scope::MuseumScope;
use async_trait::async_trait;
use queue_worker::{QueueError, ScopedHandler};
use tracing::info;

pub struct NotificationHandler;

#[async_trait]
impl<S: MuseumScope> ScopedHandler<NotificationCreate, S> for NotificationHandler {
    async fn handle(&self, scope: &S, notification: &NotificationCreate) -> Result<(), QueueError> {
        scope
            .services()
            .notifications
            .create(notification)
            .await?;
        info!(user_id = %notification.user_id, title = %notification.title, "Notification created");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "NotificationHandler"
    }
}
