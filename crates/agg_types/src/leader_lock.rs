use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single row per `lockId`: the TTL-fenced distributed lock that elects
/// exactly one Round Manager instance cluster-wide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderLock {
    pub lock_id: String,
    pub leader_id: uuid::Uuid,
    pub last_heartbeat: DateTime<Utc>,
}

impl LeaderLock {
    pub fn is_valid(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.last_heartbeat < ttl
    }
}
