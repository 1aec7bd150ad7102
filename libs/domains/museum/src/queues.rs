//! Queues consumed by the museum workers.

use queue_worker::QueueDef;

pub struct NotificationQueue;

impl QueueDef for NotificationQueue {
    const QUEUE_NAME: &'static str = "notification-mq";
}

pub struct EmailQueue;

impl QueueDef for EmailQueue {
    const QUEUE_NAME: &'static str = "email-mq";
}

pub struct OrderQueue;

impl QueueDef for OrderQueue {
    const QUEUE_NAME: &'static str = "order-mq";
}

pub struct IndexQueue;

impl QueueDef for IndexQueue {
    const QUEUE_NAME: &'static str = "index-mq";
}
