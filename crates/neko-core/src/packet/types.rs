//! Packet type definitions

/// IP version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    /// IPv4
    V4,
    /// IPv6
    V6,
}

impl IpVersion {
    /// Detect the version from the first nibble of a raw packet
    pub fn detect(data: &[u8]) -> Option<Self> {
        match data.first().map(|b| b >> 4) {
            Some(4) => Some(IpVersion::V4),
            Some(6) => Some(IpVersion::V6),
            _ => None,
        }
    }

    /// Minimum header length for this version
    pub fn min_header_len(self) -> usize {
        match self {
            IpVersion::V4 => 20,
            IpVersion::V6 => 40,
        }
    }
}

/// Transport protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// TCP (protocol number 6)
    Tcp,
    /// UDP (protocol number 17)
    Udp,
    /// ICMP (protocol number 1)
    Icmp,
    /// ICMPv6 (protocol number 58)
    Icmpv6,
    /// Unknown protocol
    Unknown,
}

impl Protocol {
    /// Create from protocol number
    pub fn from_u8(proto: u8) -> Self {
        match proto {
            1 => Protocol::Icmp,
            6 => Protocol::Tcp,
            17 => Protocol::Udp,
            58 => Protocol::Icmpv6,
            _ => Protocol::Unknown,
        }
    }

    /// Get protocol number
    pub fn to_u8(self) -> u8 {
        match self {
            Protocol::Icmp => 1,
            Protocol::Tcp => 6,
            Protocol::Udp => 17,
            Protocol::Icmpv6 => 58,
            Protocol::Unknown => 0,
        }
    }
}

/// Common well-known ports
pub mod ports {
    /// DNS port
    pub const DNS: u16 = 53;
}

/// UDP header length
pub const UDP_HEADER_LEN: usize = 8;
