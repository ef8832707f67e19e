//! Environment-variable configuration for the gateway. Each
//! module owns one config struct loaded independently via [`FromEnv`], the
//! way the teacher splits subsystem configs rather than one monolithic
//! struct.

use anyhow::Context as _;
use serde::de::DeserializeOwned;

mod bft;
mod chain;
mod high_availability;
mod identity;
mod observability;
mod round;
mod server;
mod storage;

pub use bft::BftConfig;
pub use chain::ChainConfig;
pub use high_availability::HighAvailabilityConfig;
pub use identity::IdentityConfig;
pub use observability::ObservabilityConfig;
pub use round::RoundConfig;
pub use server::ServerConfig;
pub use storage::StorageConfig;

pub trait FromEnv: Sized {
    fn from_env() -> anyhow::Result<Self>;
}

/// Loads `T` from environment variables whose names carry `prefix`.
/// `prefix: ""` loads from the flat, unprefixed namespace the wire
/// protocol's own config uses.
pub fn envy_load<T: DeserializeOwned>(name: &str, prefix: &str) -> anyhow::Result<T> {
    envy::prefixed(prefix)
        .from_env()
        .with_context(|| format!("cannot load config <{name}> from environment"))
}

/// The full set of config sections a running node assembles at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub chain: ChainConfig,
    pub high_availability: HighAvailabilityConfig,
    pub bft: BftConfig,
    pub storage: StorageConfig,
    pub observability: ObservabilityConfig,
    pub round: RoundConfig,
    pub identity: IdentityConfig,
}

impl FromEnv for GatewayConfig {
    fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            chain: ChainConfig::from_env()?,
            high_availability: HighAvailabilityConfig::from_env()?,
            bft: BftConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            observability: ObservabilityConfig::from_env()?,
            round: RoundConfig::from_env()?,
            identity: IdentityConfig::from_env()?,
        })
    }
}

impl GatewayConfig {
    pub fn for_tests() -> Self {
        Self {
            server: ServerConfig::for_tests(),
            chain: ChainConfig::for_tests(),
            high_availability: HighAvailabilityConfig::for_tests(),
            bft: BftConfig::for_tests(),
            storage: StorageConfig::for_tests(),
            observability: ObservabilityConfig::for_tests(),
            round: RoundConfig::for_tests(),
            identity: IdentityConfig::for_tests(),
        }
    }
}
