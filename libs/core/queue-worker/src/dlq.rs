//! Dead-letter entries
//!
//! A dead-lettered message is wrapped with the reason it failed and
//! published to `<queue>.dlq`, where an operator can inspect or replay it.

use crate::error::QueueError;
use crate::transport::{OutgoingMessage, QueueTransport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterEntry {
    /// Queue the message was consumed from
    pub queue: String,
    /// Original body; a JSON string when it was not valid JSON
    pub payload: serde_json::Value,
    pub error: String,
    pub category: String,
    pub retry_count: u32,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetterEntry {
    pub fn new(queue: &str, body: &[u8], error: &QueueError, retry_count: u32) -> Self {
        let payload = serde_json::from_slice(body)
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(body).into_owned()));

        Self {
            queue: queue.to_string(),
            payload,
            error: error.to_string(),
            category: error.category().to_string(),
            retry_count,
            failed_at: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct DeadLetterPublisher {
    transport: Arc<dyn QueueTransport>,
}

impl DeadLetterPublisher {
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self { transport }
    }

    pub async fn publish(&self, dlq: &str, entry: &DeadLetterEntry) -> Result<(), QueueError> {
        let message = OutgoingMessage::json(entry)?.with_retry_count(entry.retry_count);
        self.transport.publish(dlq, message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::InMemoryTransport;

    #[test]
    fn test_entry_keeps_json_payload() {
        let entry = DeadLetterEntry::new(
            "order-mq",
            br#"{"orderCode":42}"#,
            &QueueError::permanent("unknown user"),
            3,
        );
        assert_eq!(entry.payload["orderCode"], 42);
        assert_eq!(entry.category, "permanent");
        assert_eq!(entry.retry_count, 3);
        assert!(entry.error.contains("unknown user"));
    }

    #[test]
    fn test_entry_wraps_non_json_payload() {
        let entry = DeadLetterEntry::new("email-mq", b"not json", &QueueError::transient("x"), 0);
        assert_eq!(entry.payload, serde_json::Value::String("not json".into()));
    }

    #[tokio::test]
    async fn test_publish_to_dlq() {
        let transport = InMemoryTransport::new();
        let publisher = DeadLetterPublisher::new(Arc::new(transport.clone()));
        let entry = DeadLetterEntry::new("email-mq", b"{}", &QueueError::permanent("bad"), 1);

        publisher.publish("email-mq.dlq", &entry).await.unwrap();

        let stored = transport.ready_messages("email-mq.dlq");
        let decoded: DeadLetterEntry = serde_json::from_slice(&stored[0].body).unwrap();
        assert_eq!(decoded, entry);
    }
}
