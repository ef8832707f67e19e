use serde::Deserialize;

use crate::{envy_load, FromEnv};

/// `tracing`/`tracing-subscriber` setup.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default)]
    pub log_to_file: bool,
    pub log_file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "plain".to_string()
}

impl FromEnv for ObservabilityConfig {
    fn from_env() -> anyhow::Result<Self> {
        envy_load("observability", "")
    }
}

impl ObservabilityConfig {
    pub fn for_tests() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            log_to_file: false,
            log_file: None,
        }
    }
}
