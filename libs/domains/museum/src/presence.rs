//! Who is connected to the chat gateway.
//!
//! A user may hold several connections (tabs, devices). The registry is
//! owned by whoever runs the gateway and passed in where needed.

use dashmap::DashMap;
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct PresenceRegistry {
    users: DashMap<Uuid, HashSet<String>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection. Returns `true` when this is the user's first,
    /// i.e. the user just came online.
    pub fn connect(&self, user_id: Uuid, connection_id: impl Into<String>) -> bool {
        let mut connections = self.users.entry(user_id).or_default();
        let was_offline = connections.is_empty();
        connections.insert(connection_id.into());
        was_offline
    }

    /// Drop a connection. Returns `true` when it was the user's last one.
    pub fn disconnect(&self, user_id: Uuid, connection_id: &str) -> bool {
        let went_offline = match self.users.get_mut(&user_id) {
            Some(mut connections) => connections.remove(connection_id) && connections.is_empty(),
            None => false,
        };

        if went_offline {
            // Re-checked under the shard lock: a concurrent connect may have
            // landed between the two steps.
            self.users.remove_if(&user_id, |_, connections| connections.is_empty());
        }
        went_offline
    }

    pub fn connections(&self, user_id: Uuid) -> Vec<String> {
        self.users
            .get(&user_id)
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.users.get(&user_id).is_some_and(|c| !c.is_empty())
    }

    pub fn online_users(&self) -> Vec<Uuid> {
        self.users
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| *entry.key())
            .collect()
    }
}
