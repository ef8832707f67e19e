use serde::Deserialize;

use crate::{envy_load, FromEnv};

/// Per-process identity and the receipt-signing key, kept distinct from
/// the BFT-anchor key. `server_id` is normally left unset and
/// generated fresh at startup; setting it pins the id across
/// restarts, useful for leader-lock ownership continuity in tests.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct IdentityConfig {
    pub receipt_signing_key: Option<String>,
    pub server_id: Option<String>,
}

impl FromEnv for IdentityConfig {
    fn from_env() -> anyhow::Result<Self> {
        envy_load("identity", "")
    }
}

impl IdentityConfig {
    pub fn for_tests() -> Self {
        Self {
            receipt_signing_key: None,
            server_id: None,
        }
    }
}
