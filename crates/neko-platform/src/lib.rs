//! NekoFilter Platform Abstraction Layer
//!
//! This crate provides the packet side of the virtual tunnel interface.
//!
//! ## Flows
//!
//! - **[`ChannelFlow`]**: in-memory interface driven by a [`ChannelPeer`]
//! - **[`ReplayFlow`]**: batches replayed from a hex capture file
//!
//! Platform interfaces implement [`PacketFlow`] the same way.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
pub use error::{PlatformError, Result};

// Platform-agnostic traits
mod traits;
pub use traits::{AddressFamily, DnsSettings, FlowPacket, PacketFlow, TunnelSettings};

pub mod channel;
pub use channel::{ChannelFlow, ChannelPeer};

pub mod replay;
pub use replay::{format_packet, parse_batches, ReplayFlow};
