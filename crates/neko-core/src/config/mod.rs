//! Configuration management for NekoFilter
//!
//! Strongly-typed TOML configuration. Every section and field has a default,
//! so an empty file (or no file) describes a working setup.

use crate::dns::Layout;
use crate::error::{Error, Result};
use crate::history::DEFAULT_LOG_CAPACITY;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Smallest MTU accepted for the virtual interface (IPv4 minimum reassembly size)
pub const MIN_MTU: u16 = 576;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Virtual interface settings
    pub tunnel: TunnelConfig,

    /// Packet decoding settings
    pub filter: FilterConfig,

    /// Rule and history file locations
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| Error::ConfigNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(Error::from)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.tunnel.remote_ip()?;

        if self.tunnel.dns_servers.is_empty() {
            return Err(Error::config_value(
                "tunnel.dns_servers",
                "At least one DNS server is required",
            ));
        }
        self.tunnel.dns_server_ips()?;

        if self.tunnel.mtu < MIN_MTU {
            return Err(Error::config_value(
                "tunnel.mtu",
                format!("Must be at least {MIN_MTU}"),
            ));
        }

        if self.filter.dns_port == 0 {
            return Err(Error::InvalidPort {
                port: u32::from(self.filter.dns_port),
            });
        }

        if self.storage.log_capacity == 0 {
            return Err(Error::config_value(
                "storage.log_capacity",
                "Must keep at least one entry",
            ));
        }

        Ok(())
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

/// Virtual interface configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Nominal remote endpoint of the tunnel
    pub remote_address: String,
    /// DNS servers the system resolver is pointed at
    pub dns_servers: Vec<String>,
    /// Domains routed through the tunnel resolver (`""` = all)
    pub match_domains: Vec<String>,
    /// Interface MTU
    pub mtu: u16,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            remote_address: "127.0.0.1".to_string(),
            dns_servers: vec!["8.8.8.8".to_string()],
            match_domains: vec![String::new()],
            mtu: 1500,
        }
    }
}

impl TunnelConfig {
    /// Parsed remote address
    pub fn remote_ip(&self) -> Result<IpAddr> {
        parse_ip(&self.remote_address)
    }

    /// Parsed DNS server addresses
    pub fn dns_server_ips(&self) -> Result<Vec<IpAddr>> {
        self.dns_servers.iter().map(|s| parse_ip(s)).collect()
    }
}

fn parse_ip(addr: &str) -> Result<IpAddr> {
    addr.trim().parse().map_err(|_| Error::InvalidIpAddr {
        addr: addr.to_string(),
    })
}

/// Packet decoding configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// How DNS messages are located inside packets
    pub layout: Layout,
    /// UDP destination port treated as DNS (layered layout only)
    pub dns_port: u16,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            layout: Layout::default(),
            dns_port: crate::packet::ports::DNS,
        }
    }
}

/// Rule and history storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Shared data directory
    pub dir: PathBuf,
    /// Rules file name, relative to `dir`
    pub rules_file: String,
    /// History file name, relative to `dir`
    pub logs_file: String,
    /// Maximum number of history entries
    pub log_capacity: usize,
    /// Seed the history from the existing file at session start
    pub resume_history: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            rules_file: "rules.json".to_string(),
            logs_file: "logs.json".to_string(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            resume_history: true,
        }
    }
}

impl StorageConfig {
    /// Full path of the rules file
    pub fn rules_path(&self) -> PathBuf {
        self.dir.join(&self.rules_file)
    }

    /// Full path of the history file
    pub fn logs_path(&self) -> PathBuf {
        self.dir.join(&self.logs_file)
    }
}

/// Platform data directory, or the working directory when there is none
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "neko", "nekofilter")
        .map_or_else(|| PathBuf::from("."), |dirs| dirs.data_dir().to_path_buf())
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log file path (None = stderr only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// Enable JSON format logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            json_format: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tunnel.remote_address, "127.0.0.1");
        assert_eq!(config.tunnel.dns_servers, vec!["8.8.8.8"]);
        assert_eq!(config.tunnel.match_domains, vec![""]);
        assert_eq!(config.filter.layout, Layout::Layered);
        assert_eq!(config.storage.log_capacity, 100);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.tunnel, TunnelConfig::default());
        assert_eq!(config.filter, FilterConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            [filter]
            layout = "fixed-offset"

            [storage]
            dir = "/tmp/neko"
            log_capacity = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.filter.layout, Layout::FixedOffset);
        assert_eq!(config.filter.dns_port, 53);
        assert_eq!(config.storage.rules_path(), PathBuf::from("/tmp/neko/rules.json"));
        assert_eq!(config.storage.logs_path(), PathBuf::from("/tmp/neko/logs.json"));
        assert_eq!(config.storage.log_capacity, 5);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.tunnel.dns_servers.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tunnel.dns_servers = vec!["not-an-ip".into()];
        assert!(matches!(config.validate(), Err(Error::InvalidIpAddr { .. })));

        let mut config = Config::default();
        config.filter.dns_port = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidPort { port: 0 })));

        let mut config = Config::default();
        config.storage.log_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tunnel.mtu = 500;
        assert!(config.validate().is_err());
    }
}
