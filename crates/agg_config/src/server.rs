use serde::Deserialize;

use crate::{envy_load, FromEnv};

/// Transport and admission-control settings for the JSON-RPC listener.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub ssl_cert_path: Option<String>,
    pub ssl_key_path: Option<String>,
    pub concurrency_limit: u32,
}

impl FromEnv for ServerConfig {
    fn from_env() -> anyhow::Result<Self> {
        envy_load("server", "")
    }
}

impl ServerConfig {
    pub fn for_tests() -> Self {
        Self {
            port: 0,
            ssl_cert_path: None,
            ssl_key_path: None,
            concurrency_limit: 100,
        }
    }

    pub fn tls_enabled(&self) -> bool {
        self.ssl_cert_path.is_some() && self.ssl_key_path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_requires_both_cert_and_key() {
        let mut config = ServerConfig::for_tests();
        config.ssl_cert_path = Some("cert.pem".into());
        assert!(!config.tls_enabled());
        config.ssl_key_path = Some("key.pem".into());
        assert!(config.tls_enabled());
    }
}
