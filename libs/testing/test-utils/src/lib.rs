//! Shared test utilities for the workers
//!
//! - `TestRabbitMq`: RabbitMQ container with automatic cleanup (feature: "rabbitmq")
//! - `TestDataBuilder`: deterministic test data (always available)
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { workspace = true, features = ["rabbitmq"] }
//! ```
//!
//! ```rust,ignore
//! use test_utils::{TestDataBuilder, TestRabbitMq};
//!
//! #[tokio::test]
//! #[ignore = "requires Docker"]
//! async fn my_broker_test() {
//!     let broker = TestRabbitMq::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_broker_test");
//!     let queue = builder.queue_name("email");
//! }
//! ```

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

#[cfg(feature = "rabbitmq")]
mod rabbitmq;

#[cfg(feature = "rabbitmq")]
pub use rabbitmq::TestRabbitMq;

/// Builder for test data with deterministic randomization
///
/// Tests stay reproducible because every value derives from the seed.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (seed is the hash of the name)
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_scan_window");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    pub fn user_id(&self) -> Uuid {
        self.uuid(0)
    }

    /// The `n`-th deterministic UUID for this seed
    pub fn uuid(&self, n: u64) -> Uuid {
        let seed = self.seed.to_le_bytes();
        let n = n.to_le_bytes();
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&seed);
        bytes[8..].copy_from_slice(&n);
        Uuid::from_bytes(bytes)
    }

    /// A queue name unique to this test, so parallel runs against one
    /// broker do not collide
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::new(7);
    /// assert_eq!(builder.queue_name("email"), "test-email-7-mq");
    /// ```
    pub fn queue_name(&self, prefix: &str) -> String {
        format!("test-{}-{}-mq", prefix, self.seed)
    }

    /// A fixed instant, truncated to the minute
    pub fn now(&self) -> DateTime<Utc> {
        let base = Utc.with_ymd_and_hms(2026, 5, 18, 9, 0, 0).single().unwrap_or_default();
        base + Duration::minutes((self.seed % 600) as i64)
    }
}
