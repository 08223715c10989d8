//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use ts6_proto::mode::{DEFAULT_CHANMODES, DEFAULT_PREFIX};
use ts6_proto::{ModeError, ModeTable};

use super::clients::ClientBlock;
use super::limits::LimitsConfig;
use super::links::LinkBlock;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Link engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Our own server identity.
    pub server: ServerConfig,
    /// The hub we link to.
    pub uplink: LinkBlock,
    /// Framing and keep-alive limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Advertised mode feature sets.
    #[serde(default)]
    pub modes: ModesConfig,
    /// Pseudo-clients to introduce at start.
    #[serde(default, rename = "client")]
    pub clients: Vec<ClientBlock>,
    /// Log output settings.
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name (e.g., "services.example.net").
    pub name: String,
    /// Server ID for TS6 (3 characters).
    pub sid: String,
    /// Server description.
    pub description: String,
}

/// `PREFIX` / `CHANMODES` feature sets the mode-arity table is built from.
#[derive(Debug, Clone, Deserialize)]
pub struct ModesConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_chanmodes")]
    pub chanmodes: String,
}

impl ModesConfig {
    /// Build the arity table.
    pub fn table(&self) -> Result<ModeTable, ModeError> {
        ModeTable::from_features(&self.prefix, &self.chanmodes)
    }
}

impl Default for ModesConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            chanmodes: default_chanmodes(),
        }
    }
}

/// Log line encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event, for log shippers.
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub format: LogFormat,
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_chanmodes() -> String {
    DEFAULT_CHANMODES.to_string()
}
