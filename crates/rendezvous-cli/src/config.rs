//! Client configuration at `~/.rendezvous/client.toml`.
//!
//! CLI flags always override config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Default connection settings.
    #[serde(default)]
    pub default: DefaultConfig,
}

/// Default connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultConfig {
    /// Relay URL.
    #[serde(default = "default_url")]
    pub url: String,

    /// Use CBOR binary frames.
    #[serde(default)]
    pub cbor: bool,
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            cbor: false,
        }
    }
}

fn default_url() -> String {
    "ws://127.0.0.1:3000".to_string()
}

/// `~/.rendezvous/client.toml`, or a relative path when there is no home.
pub fn default_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".rendezvous")
        .join("client.toml")
}

impl Config {
    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &str) -> Result<Self> {
        let path = Path::new(path);
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}
