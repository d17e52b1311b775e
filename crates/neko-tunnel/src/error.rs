//! Session errors

use crate::session::SessionState;
use neko_platform::PlatformError;
use thiserror::Error;

/// Fatal session errors
///
/// Malformed packets and failed history writes never end a session; only
/// interface failures and bad configuration do.
#[derive(Error, Debug)]
pub enum TunnelError {
    /// The interface rejected its settings
    #[error("Failed to configure interface: {0}")]
    Configure(#[source] PlatformError),

    /// Reading a batch failed
    #[error("Failed to read packets: {0}")]
    Read(#[source] PlatformError),

    /// Writing a batch back failed
    #[error("Failed to write packets: {0}")]
    Write(#[source] PlatformError),

    /// Session configuration is invalid
    #[error("Invalid session configuration: {0}")]
    Config(#[from] neko_core::Error),

    /// `run` was called on a session that already ran
    #[error("Session already started (state: {0})")]
    AlreadyStarted(SessionState),
}

/// Tunnel result type
pub type Result<T> = std::result::Result<T, TunnelError>;
