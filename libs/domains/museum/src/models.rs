//! Queue payloads. JSON on the wire, camelCase properties.

use chrono::{DateTime, Utc};
use queue_worker::QueueJob;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// In-app notification for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationCreate {
    pub title: String,
    pub message: String,
    pub user_id: Uuid,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl QueueJob for NotificationCreate {
    fn job_id(&self) -> String {
        self.user_id.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSend {
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub is_html: bool,
}

impl QueueJob for EmailSend {
    fn job_id(&self) -> String {
        self.to.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub ticket_id: Uuid,
    pub quantity: u32,
    /// Unit price in minor currency units
    pub unit_price: i64,
}

/// Order to be created after payment confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreate {
    pub order_code: i64,
    pub user_id: Uuid,
    pub items: Vec<OrderItem>,
    pub total_amount: i64,
}

impl QueueJob for OrderCreate {
    fn job_id(&self) -> String {
        self.order_code.to_string()
    }
}

/// Searchable entity kinds.
///
/// Values this build does not know deserialize to `Unknown` so newer
/// producers never make a message undecodable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum IndexEntityType {
    Museum,
    Artifact,
    Event,
    TourOnline,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IndexAction {
    Create,
    Delete,
    #[serde(other)]
    Unknown,
}

/// Search index change for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMessage {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub entity_type: IndexEntityType,
    pub action: IndexAction,
}

impl QueueJob for IndexMessage {
    fn job_id(&self) -> String {
        format!("{}:{}", self.entity_type, self.id)
    }
}

/// A published event that is about to start, with its confirmed attendees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingEvent {
    pub id: Uuid,
    pub title: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub participant_ids: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_index_message_wire_format() {
        let id = Uuid::now_v7();
        let message: IndexMessage = serde_json::from_value(json!({
            "id": id,
            "type": "TourOnline",
            "action": "create"
        }))
        .unwrap();

        assert_eq!(message.entity_type, IndexEntityType::TourOnline);
        assert_eq!(message.action, IndexAction::Create);

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "TourOnline");
        assert_eq!(value["action"], "create");
    }

    #[test]
    fn test_unrecognized_variants_still_decode() {
        let message: IndexMessage = serde_json::from_value(json!({
            "id": Uuid::nil(),
            "type": "Exhibition",
            "action": "reindex"
        }))
        .unwrap();

        assert_eq!(message.entity_type, IndexEntityType::Unknown);
        assert_eq!(message.action, IndexAction::Unknown);
    }

    #[test]
    fn test_notification_uses_camel_case() {
        let user_id = Uuid::now_v7();
        let value = serde_json::to_value(NotificationCreate {
            title: "Hi".into(),
            message: "There".into(),
            user_id,
            metadata: json!({ "eventId": "e1" }),
        })
        .unwrap();

        assert_eq!(value["userId"], json!(user_id));
        assert_eq!(value["metadata"]["eventId"], "e1");
    }

    #[test]
    fn test_order_create_fields() {
        let order: OrderCreate = serde_json::from_value(json!({
            "orderCode": 1700000000123_i64,
            "userId": Uuid::nil(),
            "items": [{ "ticketId": Uuid::nil(), "quantity": 2, "unitPrice": 50000 }],
            "totalAmount": 100000
        }))
        .unwrap();

        assert_eq!(order.order_code, 1700000000123);
        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(order.job_id(), "1700000000123");
    }

    #[test]
    fn test_email_defaults_to_plain_text() {
        let email: EmailSend = serde_json::from_value(json!({
            "to": "visitor@example.com",
            "subject": "Your tickets",
            "body": "See attachment"
        }))
        .unwrap();
        assert!(!email.is_html);
    }
}
