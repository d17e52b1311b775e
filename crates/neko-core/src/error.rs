//! Error types for neko-core
//!
//! Centralized error handling using `thiserror` for ergonomic error definitions.
//! Failures on the packet path have their own narrower types
//! ([`ExtractError`](crate::dns::ExtractError),
//! [`StoreError`](crate::store::StoreError)) because they never abort the loop.

use thiserror::Error;

/// Main error type for neko-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Packet parsing failed
    #[error("Packet parsing error: {message}")]
    PacketParse {
        /// Detailed error message
        message: String,
        /// Offset in packet where error occurred
        offset: Option<usize>,
    },

    /// Packet is too small to process
    #[error("Packet too small: expected at least {expected} bytes, got {actual}")]
    PacketTooSmall {
        /// Minimum expected size
        expected: usize,
        /// Actual packet size
        actual: usize,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// Path to the missing config file
        path: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    ConfigValue {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    /// Invalid IP address
    #[error("Invalid IP address: {addr}")]
    InvalidIpAddr {
        /// The invalid address
        addr: String,
    },

    /// Invalid port number
    #[error("Invalid port number: {port} (must be 1-65535)")]
    InvalidPort {
        /// The invalid port
        port: u32,
    },

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a packet parse error
    pub fn packet_parse(message: impl Into<String>) -> Self {
        Self::PacketParse {
            message: message.into(),
            offset: None,
        }
    }

    /// Create a packet parse error with offset
    pub fn packet_parse_at(message: impl Into<String>, offset: usize) -> Self {
        Self::PacketParse {
            message: message.into(),
            offset: Some(offset),
        }
    }

    /// Create a config value error
    pub fn config_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::packet_parse("Invalid header");
        assert!(err.to_string().contains("Invalid header"));

        let err = Error::config_value("tunnel.dns_servers", "must not be empty");
        assert!(err.to_string().contains("tunnel.dns_servers"));
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn test_error_with_offset() {
        let err = Error::packet_parse_at("Invalid byte", 42);
        match err {
            Error::PacketParse { offset, .. } => assert_eq!(offset, Some(42)),
            _ => panic!("Wrong error type"),
        }
    }
}
