use crate::models::EmailSend;
use crate::scope::MuseumScope;
use async_trait::async_trait;
use queue_worker::{QueueError, ScopedHandler};
use tracing::info;

pub struct EmailHandler;

#[async_trait]
impl<S: MuseumScope> ScopedHandler<EmailSend, S> for EmailHandler {
    async fn handle(&self, scope: &S, email: &EmailSend) -> Result<(), QueueError> {
        scope.services().mail.send(email).await?;
        info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "EmailHandler"
    }
}
