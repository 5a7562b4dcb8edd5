//! Runtime configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

/// Tunables for a [`Runtime`](crate::Runtime)
///
/// Every field has a default, so an empty YAML document is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HooksConfig {
    /// Upper bound on ticks performed by `run_until_idle`
    #[serde(default = "default_max_idle_rounds")]
    pub max_idle_rounds: usize,

    /// Upper bound on queued notification rounds for one store key
    #[serde(default = "default_max_store_cascade")]
    pub max_store_cascade: usize,

    /// Link stores to the transport, when one is configured
    #[serde(default = "default_true")]
    pub broadcast: bool,

    /// Prefix prepended to store keys to form broadcast channel names
    #[serde(default)]
    pub channel_prefix: String,
}

fn default_max_idle_rounds() -> usize {
    1000
}

fn default_max_store_cascade() -> usize {
    64
}

fn default_true() -> bool {
    true
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            max_idle_rounds: default_max_idle_rounds(),
            max_store_cascade: default_max_store_cascade(),
            broadcast: true,
            channel_prefix: String::new(),
        }
    }
}

impl HooksConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    /// Parse configuration from a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Broadcast channel name for a store key
    pub fn channel_name(&self, key: &str) -> String {
        format!("{}{}", self.channel_prefix, key)
    }
}
