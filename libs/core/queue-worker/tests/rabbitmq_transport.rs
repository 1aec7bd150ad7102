//! Broker integration tests. Run with `cargo test -- --ignored` when Docker
//! is available.

use queue_worker::{
    OutgoingMessage, Outcome, QueueError, QueueJob, QueueProcessor, QueueTransport, QueueWorker,
    RabbitMqConfig, RabbitMqTransport, RetryPolicy, WorkerConfig, dlq_name,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use test_utils::{TestDataBuilder, TestRabbitMq};
use tokio::time::timeout;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct Ping {
    sequence: u32,
    label: String,
}

impl QueueJob for Ping {
    fn job_id(&self) -> String {
        self.sequence.to_string()
    }
}

struct FailOdd;

#[async_trait::async_trait]
impl QueueProcessor<Ping> for FailOdd {
    async fn process(&self, job: &Ping) -> Result<(), QueueError> {
        if job.sequence % 2 == 1 {
            return Err(QueueError::permanent("odd sequence"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "FailOdd"
    }
}

async fn transport(broker: &TestRabbitMq) -> Arc<RabbitMqTransport> {
    Arc::new(
        RabbitMqTransport::connect(&RabbitMqConfig::new(broker.amqp_url()))
            .await
            .expect("connect"),
    )
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_publish_then_consume_preserves_body_and_retry_count() {
    let broker = TestRabbitMq::new().await;
    let transport = transport(&broker).await;
    let queue = TestDataBuilder::from_test_name("roundtrip").queue_name("ping");

    let ping = Ping {
        sequence: 7,
        label: "hello".into(),
    };
    transport
        .publish(&queue, OutgoingMessage::json(&ping).unwrap().with_retry_count(2))
        .await
        .unwrap();

    let mut subscription = transport.subscribe(&queue, "it-consumer", 1).await.unwrap();
    let delivery = timeout(Duration::from_secs(10), subscription.next())
        .await
        .expect("timed out")
        .expect("stream ended")
        .unwrap();

    assert_eq!(delivery.retry_count, 2);
    assert_eq!(delivery.decode::<Ping>().unwrap(), ping);
    delivery.ack().await.unwrap();
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_rejected_message_lands_in_dlq() {
    let broker = TestRabbitMq::new().await;
    let transport = transport(&broker).await;
    let queue = TestDataBuilder::from_test_name("reject").queue_name("ping");

    transport
        .publish(&queue, OutgoingMessage::new(b"not json".to_vec()))
        .await
        .unwrap();

    let mut subscription = transport.subscribe(&queue, "it-consumer", 1).await.unwrap();
    let delivery = timeout(Duration::from_secs(10), subscription.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    delivery.nack(false).await.unwrap();

    let mut dead = transport
        .subscribe(&dlq_name(&queue), "it-dlq", 1)
        .await
        .unwrap();
    let dead_letter = timeout(Duration::from_secs(10), dead.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(dead_letter.body, b"not json");
    dead_letter.ack().await.unwrap();
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_worker_outcomes_against_broker() {
    let broker = TestRabbitMq::new().await;
    let transport = transport(&broker).await;
    let queue = TestDataBuilder::from_test_name("worker").queue_name("ping");

    for sequence in 0..2 {
        let ping = Ping {
            sequence,
            label: format!("ping-{}", sequence),
        };
        transport
            .publish(&queue, OutgoingMessage::json(&ping).unwrap())
            .await
            .unwrap();
    }

    let config = WorkerConfig::new(&queue).with_retry(RetryPolicy::immediate(0));
    let worker = QueueWorker::<Ping, _>::new(transport.clone(), FailOdd, config);

    let mut subscription = transport.subscribe(&queue, "it-worker", 1).await.unwrap();
    let mut outcomes = Vec::new();
    for _ in 0..2 {
        let delivery = timeout(Duration::from_secs(10), subscription.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        outcomes.push(worker.handle_delivery(delivery).await);
    }
    assert_eq!(outcomes, vec![Outcome::Acked, Outcome::DeadLettered]);

    transport.close().await.unwrap();
}
