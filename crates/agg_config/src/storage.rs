use serde::Deserialize;

use crate::{envy_load, FromEnv};

/// Where durable state (commitments, cursor, leader lock, resume tokens)
/// lives. `storage_uri` of `memory://` selects the in-process
/// backend used for tests and standalone demos.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StorageConfig {
    pub storage_uri: String,
}

impl FromEnv for StorageConfig {
    fn from_env() -> anyhow::Result<Self> {
        envy_load("storage", "")
    }
}

impl StorageConfig {
    pub fn is_in_memory(&self) -> bool {
        self.storage_uri.starts_with("memory://")
    }

    pub fn for_tests() -> Self {
        Self {
            storage_uri: "memory://".to_string(),
        }
    }
}
