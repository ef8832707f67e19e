use std::time::Duration;

use serde::Deserialize;

use crate::{envy_load, FromEnv};

/// Leader-election timing. `disable_high_availability` puts the
/// node into standalone mode, where it is always its own leader.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HighAvailabilityConfig {
    #[serde(default)]
    pub disable_high_availability: bool,
    pub lock_ttl_seconds: u64,
    pub leader_heartbeat_interval_ms: u64,
    pub leader_election_polling_interval_ms: u64,
}

impl FromEnv for HighAvailabilityConfig {
    fn from_env() -> anyhow::Result<Self> {
        envy_load("high_availability", "")
    }
}

impl HighAvailabilityConfig {
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_seconds)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.leader_heartbeat_interval_ms)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.leader_election_polling_interval_ms)
    }

    pub fn for_tests() -> Self {
        Self {
            disable_high_availability: true,
            lock_ttl_seconds: 30,
            leader_heartbeat_interval_ms: 5_000,
            leader_election_polling_interval_ms: 1_000,
        }
    }
}
