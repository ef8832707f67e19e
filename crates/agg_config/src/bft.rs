use std::time::Duration;

use serde::Deserialize;

use crate::{envy_load, FromEnv};

/// Connection settings for the BFT anchor client.
/// `use_mock_bft` swaps in [`agg_bft::MockBftAnchorClient`] for local
/// development and tests.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BftConfig {
    #[serde(default)]
    pub use_mock_bft: bool,
    pub bft_endpoint: Option<String>,
    pub bft_network: Option<String>,
    pub bft_partition_id: Option<String>,
    pub bft_signing_key: Option<String>,
    pub bft_submit_timeout_ms: u64,
}

impl FromEnv for BftConfig {
    fn from_env() -> anyhow::Result<Self> {
        envy_load("bft", "")
    }
}

impl BftConfig {
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.bft_submit_timeout_ms)
    }

    pub fn for_tests() -> Self {
        Self {
            use_mock_bft: true,
            bft_endpoint: None,
            bft_network: None,
            bft_partition_id: None,
            bft_signing_key: None,
            bft_submit_timeout_ms: 5_000,
        }
    }
}
