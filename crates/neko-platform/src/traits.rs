//! Platform-agnostic traits for the virtual interface
//!
//! A [`PacketFlow`] is the packet side of a tunnel interface: the system
//! hands us batches of raw IP packets and takes back whatever we write.
//! Implementations exist per platform; this crate ships in-memory and
//! file-replay flows.

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use neko_core::config::TunnelConfig;
use neko_core::packet::IpVersion;
use std::fmt;
use std::net::IpAddr;

/// Packet source and sink of a tunnel interface
///
/// Calls are made from a single task and never overlap.
/// `read_packets` must be cancel-safe: a read abandoned by a stop request
/// must not lose a batch that was not yet returned.
#[async_trait]
pub trait PacketFlow: Send {
    /// Apply interface settings; called once before the first read
    async fn configure(&mut self, settings: &TunnelSettings) -> Result<()>;

    /// Wait for the next batch of packets
    ///
    /// `Ok(None)` means the interface was torn down from the other side.
    async fn read_packets(&mut self) -> Result<Option<Vec<FlowPacket>>>;

    /// Hand a batch of packets back to the system
    async fn write_packets(&mut self, packets: Vec<FlowPacket>) -> Result<()>;

    /// Release the interface
    async fn close(&mut self) -> Result<()>;
}

/// Address family metadata carried with each packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// IPv4
    Inet,
    /// IPv6
    Inet6,
}

impl AddressFamily {
    /// Guess the family from the IP version nibble
    pub fn detect(data: &[u8]) -> Option<Self> {
        IpVersion::detect(data).map(Self::from)
    }

    /// Short tag used in replay files (`4` or `6`)
    pub fn tag(self) -> &'static str {
        match self {
            Self::Inet => "4",
            Self::Inet6 => "6",
        }
    }

    /// Parse a replay file tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "4" => Some(Self::Inet),
            "6" => Some(Self::Inet6),
            _ => None,
        }
    }
}

impl From<IpVersion> for AddressFamily {
    fn from(version: IpVersion) -> Self {
        match version {
            IpVersion::V4 => Self::Inet,
            IpVersion::V6 => Self::Inet6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inet => write!(f, "IPv4"),
            Self::Inet6 => write!(f, "IPv6"),
        }
    }
}

/// A raw packet with its address family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowPacket {
    /// Raw packet bytes
    pub data: Bytes,
    /// Address family reported by the interface
    pub family: AddressFamily,
}

impl FlowPacket {
    /// Create a packet with an explicit family
    pub fn new(data: impl Into<Bytes>, family: AddressFamily) -> Self {
        Self {
            data: data.into(),
            family,
        }
    }

    /// Create a packet, taking the family from the IP header (IPv4 if unknown)
    pub fn detect(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let family = AddressFamily::detect(&data).unwrap_or(AddressFamily::Inet);
        Self { data, family }
    }

    /// Same family, different bytes
    #[must_use]
    pub fn with_data(&self, data: Bytes) -> Self {
        Self {
            data,
            family: self.family,
        }
    }
}

/// Resolver settings pushed to the system with the interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsSettings {
    /// DNS servers the system resolver should use
    pub servers: Vec<IpAddr>,
    /// Domains whose queries go through the tunnel (`""` = all)
    pub match_domains: Vec<String>,
}

/// Interface settings applied before packets flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSettings {
    /// Nominal remote endpoint
    pub remote_address: IpAddr,
    /// Resolver settings
    pub dns: DnsSettings,
    /// Interface MTU
    pub mtu: u16,
}

impl TunnelSettings {
    /// Build settings from the `[tunnel]` configuration section
    pub fn from_config(config: &TunnelConfig) -> neko_core::Result<Self> {
        Ok(Self {
            remote_address: config.remote_ip()?,
            dns: DnsSettings {
                servers: config.dns_server_ips()?,
                match_domains: config.match_domains.clone(),
            },
            mtu: config.mtu,
        })
    }

    /// Check if every DNS query is routed through the tunnel
    pub fn matches_all_domains(&self) -> bool {
        self.dns.match_domains.iter().any(String::is_empty)
    }
}

impl Default for TunnelSettings {
    fn default() -> Self {
        Self {
            remote_address: IpAddr::from([127, 0, 0, 1]),
            dns: DnsSettings {
                servers: vec![IpAddr::from([8, 8, 8, 8])],
                match_domains: vec![String::new()],
            },
            mtu: 1500,
        }
    }
}
