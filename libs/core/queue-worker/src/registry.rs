//! Queue registry types and definitions.
//!
//! - `QueueDef` trait for domain-specific queue definitions
//! - `QueueName` enum listing every queue the platform knows about

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Suffix appended to a queue name to form its dead-letter queue.
pub const DLQ_SUFFIX: &str = ".dlq";

/// Dead-letter queue name for `queue`.
pub fn dlq_name(queue: &str) -> String {
    format!("{queue}{DLQ_SUFFIX}")
}

/// Queue definition trait.
///
/// Each domain implements this trait to describe a queue it consumes.
///
/// ```rust,ignore
/// pub struct EmailQueue;
///
/// impl QueueDef for EmailQueue {
///     const QUEUE_NAME: &'static str = "email-mq";
/// }
/// ```
pub trait QueueDef: Send + Sync {
    /// The broker queue name (e.g., "email-mq")
    const QUEUE_NAME: &'static str;

    /// Retries allowed before a retryable failure is dead-lettered.
    const MAX_RETRIES: u32 = 3;

    /// Whether failures end up in `<queue>.dlq` or are only logged.
    const DLQ_ENABLED: bool = true;

    fn queue_name() -> &'static str {
        Self::QUEUE_NAME
    }

    fn dlq_name() -> String {
        dlq_name(Self::QUEUE_NAME)
    }
}

/// Every named queue on the platform.
///
/// Some are reserved: declared so producers can publish, with no consumer in
/// this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, AsRefStr, EnumString, EnumIter)]
pub enum QueueName {
    #[strum(serialize = "notification-mq")]
    Notification,
    #[strum(serialize = "push-notification-mq")]
    PushNotification,
    #[strum(serialize = "embeddings-mq")]
    Embeddings,
    #[strum(serialize = "email-mq")]
    Email,
    #[strum(serialize = "ai-chat-mq")]
    AiChat,
    #[strum(serialize = "order-mq")]
    Order,
    #[strum(serialize = "index-mq")]
    Index,
}

impl QueueName {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Notification => "notification-mq",
            Self::PushNotification => "push-notification-mq",
            Self::Embeddings => "embeddings-mq",
            Self::Email => "email-mq",
            Self::AiChat => "ai-chat-mq",
            Self::Order => "order-mq",
            Self::Index => "index-mq",
        }
    }

    /// Declared but not consumed by any worker.
    pub fn is_reserved(&self) -> bool {
        matches!(self, Self::PushNotification | Self::Embeddings | Self::AiChat)
    }

    pub fn dlq(&self) -> String {
        dlq_name(self.name())
    }

    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }
}
