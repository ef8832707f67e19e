use std::time::Duration;

use serde::Deserialize;

use crate::{envy_load, FromEnv};

/// Round manager timing and batching.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RoundConfig {
    pub round_duration_ms: u64,
    pub commitment_batch_size: u32,
    pub smt_lock_timeout_ms: u64,
    pub validator_pool_size: Option<usize>,
}

impl FromEnv for RoundConfig {
    fn from_env() -> anyhow::Result<Self> {
        envy_load("round", "")
    }
}

impl RoundConfig {
    pub fn round_duration(&self) -> Duration {
        Duration::from_millis(self.round_duration_ms)
    }

    pub fn smt_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.smt_lock_timeout_ms)
    }

    /// `min(4, available_parallelism())` unless overridden.
    pub fn validator_pool_size(&self) -> usize {
        self.validator_pool_size.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .min(4)
        })
    }

    pub fn for_tests() -> Self {
        Self {
            round_duration_ms: 1_000,
            commitment_batch_size: 100,
            smt_lock_timeout_ms: 10_000,
            validator_pool_size: Some(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validator_pool_size_falls_back_to_parallelism_cap() {
        let mut config = RoundConfig::for_tests();
        config.validator_pool_size = None;
        assert!(config.validator_pool_size() >= 1);
        assert!(config.validator_pool_size() <= 4);
    }
}
