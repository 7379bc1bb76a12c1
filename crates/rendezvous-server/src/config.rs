//! Server configuration: TOML file + CLI/environment overrides.

use rendezvous_core::{RendezvousError, RendezvousResult};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
}

/// `[server]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_frame_size: default_max_frame_size(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_max_frame_size() -> usize {
    1_048_576
}
fn default_outbound_buffer() -> usize {
    64
}

/// Resolved server configuration (CLI overrides applied).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// Largest inbound frame accepted, in bytes.
    pub max_frame_size: usize,
    /// Capacity of each session's outbound queue.
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: default_port(),
            max_frame_size: default_max_frame_size(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

impl ServerConfig {
    /// Load config from TOML file, then apply CLI overrides.
    ///
    /// A missing file means defaults; an unreadable or malformed one is an error.
    pub fn load(
        config_path: Option<&Path>,
        cli_port: Option<u16>,
        cli_bind: Option<&str>,
    ) -> RendezvousResult<Self> {
        let file_config = match config_path {
            Some(path) => {
                let expanded = expand_tilde(path);
                if expanded.exists() {
                    info!(path = %expanded.display(), "loading config file");
                    let content = std::fs::read_to_string(&expanded)?;
                    toml::from_str::<ConfigFile>(&content).map_err(|e| {
                        RendezvousError::Config(format!("{}: {e}", expanded.display()))
                    })?
                } else {
                    info!(path = %expanded.display(), "config file not found, using defaults");
                    ConfigFile::default()
                }
            }
            None => ConfigFile::default(),
        };

        Self::from_section(file_config.server, cli_port, cli_bind)
    }

    fn from_section(
        section: ServerSection,
        cli_port: Option<u16>,
        cli_bind: Option<&str>,
    ) -> RendezvousResult<Self> {
        let bind_str = cli_bind.unwrap_or(&section.bind);
        let bind: IpAddr = bind_str
            .parse()
            .map_err(|e| RendezvousError::Config(format!("invalid bind address {bind_str:?}: {e}")))?;

        if section.outbound_buffer == 0 {
            return Err(RendezvousError::Config(
                "outbound_buffer must be at least 1".into(),
            ));
        }
        if section.max_frame_size == 0 {
            return Err(RendezvousError::Config(
                "max_frame_size must be at least 1".into(),
            ));
        }

        Ok(Self {
            bind,
            port: cli_port.unwrap_or(section.port),
            max_frame_size: section.max_frame_size,
            outbound_buffer: section.outbound_buffer,
        })
    }

    /// Address the listener binds to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.bind.to_string(), "0.0.0.0");
        assert_eq!(cfg.max_frame_size, 1_048_576);
        assert_eq!(cfg.outbound_buffer, 64);
        assert_eq!(cfg.socket_addr().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        let cfg = ServerConfig::load(Some(&path), None, None).unwrap();
        assert_eq!(cfg.port, 3000);
    }

    #[test]
    fn file_values_and_cli_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
bind = "127.0.0.1"
port = 8080
outbound_buffer = 8
"#
        )
        .unwrap();

        let cfg = ServerConfig::load(Some(file.path()), None, None).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.bind.to_string(), "127.0.0.1");
        assert_eq!(cfg.outbound_buffer, 8);
        assert_eq!(cfg.max_frame_size, 1_048_576);

        let cfg = ServerConfig::load(Some(file.path()), Some(9000), Some("::1")).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.socket_addr().to_string(), "[::1]:9000");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = \"not a number\"").unwrap();
        let err = ServerConfig::load(Some(file.path()), None, None).unwrap_err();
        assert!(matches!(err, RendezvousError::Config(_)));
    }

    #[test]
    fn zero_buffer_rejected() {
        let section = ServerSection {
            outbound_buffer: 0,
            ..ServerSection::default()
        };
        assert!(ServerConfig::from_section(section, None, None).is_err());
    }

    #[test]
    fn bad_bind_rejected() {
        let section = ServerSection::default();
        assert!(ServerConfig::from_section(section, None, Some("localhost:80")).is_err());
    }
}
