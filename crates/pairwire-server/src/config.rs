//! Server configuration: TOML file + CLI overrides.

use pairwire_core::{PairwireError, PairwireResult};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
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
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_frame_bytes: default_max_frame_bytes(),
            outbound_buffer: default_outbound_buffer(),
            event_buffer: default_event_buffer(),
            stats_interval_secs: default_stats_interval(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    4000
}
fn default_max_frame_bytes() -> usize {
    64 * 1024
}
fn default_outbound_buffer() -> usize {
    64
}
fn default_event_buffer() -> usize {
    1024
}
fn default_stats_interval() -> u64 {
    60
}

/// Resolved server configuration (CLI overrides applied, values validated).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Inbound frames above this size are dropped.
    pub max_frame_bytes: usize,
    /// Per-connection outbound channel capacity.
    pub outbound_buffer: usize,
    /// Hub event channel capacity.
    pub event_buffer: usize,
    pub stats_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], default_port())),
            max_frame_bytes: default_max_frame_bytes(),
            outbound_buffer: default_outbound_buffer(),
            event_buffer: default_event_buffer(),
            stats_interval: Duration::from_secs(default_stats_interval()),
        }
    }
}

impl ServerConfig {
    /// Load config from TOML file, then apply CLI overrides.
    pub fn load(
        config_path: Option<&Path>,
        cli_bind: Option<&str>,
        cli_port: Option<u16>,
    ) -> PairwireResult<Self> {
        let file_config = match config_path {
            Some(path) => {
                let expanded = expand_tilde(path);
                if expanded.exists() {
                    info!(path = %expanded.display(), "loading config file");
                    let content = std::fs::read_to_string(&expanded)?;
                    Self::parse(&content)?
                } else {
                    info!(path = %expanded.display(), "config file not found, using defaults");
                    ConfigFile::default()
                }
            }
            None => ConfigFile::default(),
        };

        Self::resolve(file_config, cli_bind, cli_port)
    }

    /// Parse TOML text into a [`ConfigFile`].
    pub fn parse(content: &str) -> PairwireResult<ConfigFile> {
        toml::from_str::<ConfigFile>(content)
            .map_err(|e| PairwireError::Config(format!("config parse error: {e}")))
    }

    /// Merge CLI overrides into a parsed file and validate the result.
    pub fn resolve(
        file_config: ConfigFile,
        cli_bind: Option<&str>,
        cli_port: Option<u16>,
    ) -> PairwireResult<Self> {
        let server = file_config.server;
        let bind = cli_bind.unwrap_or(&server.bind);
        let port = cli_port.unwrap_or(server.port);

        let ip: IpAddr = bind
            .parse()
            .map_err(|e| PairwireError::Config(format!("invalid bind address {bind:?}: {e}")))?;

        if server.outbound_buffer == 0 || server.event_buffer == 0 {
            return Err(PairwireError::Config(
                "outbound_buffer and event_buffer must be at least 1".into(),
            ));
        }
        if server.max_frame_bytes == 0 {
            return Err(PairwireError::Config("max_frame_bytes must be at least 1".into()));
        }

        Ok(Self {
            bind_addr: SocketAddr::new(ip, port),
            max_frame_bytes: server.max_frame_bytes,
            outbound_buffer: server.outbound_buffer,
            event_buffer: server.event_buffer,
            stats_interval: Duration::from_secs(server.stats_interval_secs.max(1)),
        })
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

    #[test]
    fn defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr, "0.0.0.0:4000".parse().unwrap());
        assert_eq!(cfg.max_frame_bytes, 65536);
        assert_eq!(cfg.outbound_buffer, 64);
        assert_eq!(cfg.stats_interval, Duration::from_secs(60));
    }

    #[test]
    fn parse_partial_file() {
        let file = ServerConfig::parse(
            r#"
            [server]
            port = 9000
            max_frame_bytes = 1024
            "#,
        )
        .unwrap();
        let cfg = ServerConfig::resolve(file, None, None).unwrap();
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.max_frame_bytes, 1024);
        assert_eq!(cfg.event_buffer, 1024);
    }

    #[test]
    fn cli_overrides_file() {
        let file = ServerConfig::parse("[server]\nport = 9000\nbind = \"0.0.0.0\"").unwrap();
        let cfg = ServerConfig::resolve(file, Some("127.0.0.1"), Some(7000)).unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:7000".parse().unwrap());
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(ServerConfig::parse("[server]\nport = \"high\"").is_err());
        assert!(ServerConfig::resolve(ConfigFile::default(), Some("not-an-ip"), None).is_err());

        let file = ServerConfig::parse("[server]\noutbound_buffer = 0").unwrap();
        assert!(ServerConfig::resolve(file, None, None).is_err());
    }

    #[test]
    fn zero_stats_interval_clamped() {
        let file = ServerConfig::parse("[server]\nstats_interval_secs = 0").unwrap();
        let cfg = ServerConfig::resolve(file, None, None).unwrap();
        assert_eq!(cfg.stats_interval, Duration::from_secs(1));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let path = Path::new("/nonexistent/pairwire/config.toml");
        let cfg = ServerConfig::load(Some(path), None, Some(4100)).unwrap();
        assert_eq!(cfg.bind_addr.port(), 4100);
    }

    #[test]
    fn tilde_expansion() {
        let plain = expand_tilde(Path::new("/etc/pairwire.toml"));
        assert_eq!(plain, PathBuf::from("/etc/pairwire.toml"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/x.toml")), home.join("x.toml"));
        }
    }
}
