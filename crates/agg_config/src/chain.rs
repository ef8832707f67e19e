use agg_types::Digest32;
use serde::Deserialize;

use crate::{envy_load, FromEnv};

/// Values stamped into every [`agg_types::Block`] header.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub version: String,
    pub fork_id: u64,
    pub initial_block_hash: Digest32,
}

impl FromEnv for ChainConfig {
    fn from_env() -> anyhow::Result<Self> {
        envy_load("chain", "")
    }
}

impl ChainConfig {
    pub fn for_tests() -> Self {
        Self {
            chain_id: 1,
            version: "1".to_string(),
            fork_id: 0,
            initial_block_hash: Digest32([0u8; 32]),
        }
    }
}
