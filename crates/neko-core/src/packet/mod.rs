//! Packet decoding and rewriting
//!
//! Low-level IP/UDP handling for packets read from the virtual interface.

mod checksum;
mod types;

pub use checksum::Checksum;
pub use types::*;

use crate::error::{Error, Result};
use bytes::{Bytes, BytesMut};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Represents a network packet with decoded IP and transport headers
#[derive(Debug, Clone)]
pub struct Packet {
    /// Raw packet data
    data: BytesMut,
    /// IP version
    pub ip_version: IpVersion,
    /// Transport protocol
    pub protocol: Protocol,
    /// Source IP address
    pub src_addr: IpAddr,
    /// Destination IP address
    pub dst_addr: IpAddr,
    /// Source port (UDP only)
    pub src_port: u16,
    /// Destination port (UDP only)
    pub dst_port: u16,
    /// IP header length
    ip_header_len: usize,
    /// Transport header length
    transport_header_len: usize,
    /// IPv4 "more fragments" flag or non-zero fragment offset
    fragmented: bool,
}

impl Packet {
    /// Decode a packet from raw bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let Some(ip_version) = IpVersion::detect(data) else {
            return match data.first() {
                None => Err(Error::PacketTooSmall {
                    expected: 1,
                    actual: 0,
                }),
                Some(b) => Err(Error::packet_parse_at(
                    format!("Unknown IP version: {}", b >> 4),
                    0,
                )),
            };
        };

        let mut packet = Self {
            data: BytesMut::from(data),
            ip_version,
            protocol: Protocol::Unknown,
            src_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            dst_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            src_port: 0,
            dst_port: 0,
            ip_header_len: 0,
            transport_header_len: 0,
            fragmented: false,
        };

        match ip_version {
            IpVersion::V4 => packet.parse_ipv4()?,
            IpVersion::V6 => packet.parse_ipv6()?,
        }
        packet.parse_transport()?;

        Ok(packet)
    }

    /// Parse IPv4 header
    fn parse_ipv4(&mut self) -> Result<()> {
        self.require(20)?;

        self.ip_header_len = usize::from(self.data[0] & 0x0F) * 4;
        if self.ip_header_len < 20 {
            return Err(Error::packet_parse_at(
                format!("Invalid IPv4 header length: {}", self.ip_header_len),
                0,
            ));
        }
        self.require(self.ip_header_len)?;

        let flags_fragment = u16::from_be_bytes([self.data[6], self.data[7]]);
        self.fragmented = flags_fragment & 0x2000 != 0 || flags_fragment & 0x1FFF != 0;

        self.protocol = Protocol::from_u8(self.data[9]);

        self.src_addr = IpAddr::V4(Ipv4Addr::new(
            self.data[12],
            self.data[13],
            self.data[14],
            self.data[15],
        ));
        self.dst_addr = IpAddr::V4(Ipv4Addr::new(
            self.data[16],
            self.data[17],
            self.data[18],
            self.data[19],
        ));

        Ok(())
    }

    /// Parse IPv6 header
    ///
    /// Extension headers are not walked; a packet whose next header is not
    /// directly a transport protocol decodes as [`Protocol::Unknown`].
    fn parse_ipv6(&mut self) -> Result<()> {
        self.require(40)?;

        self.ip_header_len = 40;
        self.protocol = Protocol::from_u8(self.data[6]);

        let mut src_bytes = [0u8; 16];
        let mut dst_bytes = [0u8; 16];
        src_bytes.copy_from_slice(&self.data[8..24]);
        dst_bytes.copy_from_slice(&self.data[24..40]);

        self.src_addr = IpAddr::V6(Ipv6Addr::from(src_bytes));
        self.dst_addr = IpAddr::V6(Ipv6Addr::from(dst_bytes));

        Ok(())
    }

    /// Parse transport layer (UDP only, others are left opaque)
    fn parse_transport(&mut self) -> Result<()> {
        let offset = self.ip_header_len;

        if self.protocol == Protocol::Udp && !self.fragmented {
            self.require(offset + UDP_HEADER_LEN)?;

            self.src_port = u16::from_be_bytes([self.data[offset], self.data[offset + 1]]);
            self.dst_port = u16::from_be_bytes([self.data[offset + 2], self.data[offset + 3]]);
            self.transport_header_len = UDP_HEADER_LEN;
        }

        Ok(())
    }

    fn require(&self, expected: usize) -> Result<()> {
        if self.data.len() < expected {
            return Err(Error::PacketTooSmall {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    /// Get the payload (data after headers)
    pub fn payload(&self) -> &[u8] {
        let offset = self.payload_offset();
        if offset < self.data.len() {
            &self.data[offset..]
        } else {
            &[]
        }
    }

    /// Offset of the transport payload inside the raw packet
    pub fn payload_offset(&self) -> usize {
        self.ip_header_len + self.transport_header_len
    }

    /// Check if this is a UDP packet with a decoded header
    pub fn is_udp(&self) -> bool {
        matches!(self.protocol, Protocol::Udp) && self.transport_header_len == UDP_HEADER_LEN
    }

    /// Check if this is IPv4
    pub fn is_ipv4(&self) -> bool {
        matches!(self.ip_version, IpVersion::V4)
    }

    /// Check if this is IPv6
    pub fn is_ipv6(&self) -> bool {
        matches!(self.ip_version, IpVersion::V6)
    }

    /// Check if this is an IPv4 fragment
    pub fn is_fragment(&self) -> bool {
        self.fragmented
    }

    /// Get the raw packet data
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable raw packet data
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get total packet length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if packet is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consume the packet into immutable bytes
    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }

    /// Swap source and destination addresses and UDP ports in place
    pub fn swap_endpoints(&mut self) {
        match self.ip_version {
            IpVersion::V4 => swap_ranges(&mut self.data, 12, 16, 4),
            IpVersion::V6 => swap_ranges(&mut self.data, 8, 24, 16),
        }
        std::mem::swap(&mut self.src_addr, &mut self.dst_addr);

        if self.is_udp() {
            let offset = self.ip_header_len;
            swap_ranges(&mut self.data, offset, offset + 2, 2);
            std::mem::swap(&mut self.src_port, &mut self.dst_port);
        }
    }

    /// Recompute the IPv4 header checksum and the UDP checksum
    pub fn update_checksums(&mut self) {
        if self.is_ipv4() {
            let checksum = Checksum::ipv4_header(&self.data[..self.ip_header_len]);
            self.data[10..12].copy_from_slice(&checksum.to_be_bytes());
        }

        if !self.is_udp() {
            return;
        }

        let offset = self.ip_header_len;
        let end = self.udp_end();
        self.data[offset + 6] = 0;
        self.data[offset + 7] = 0;

        let segment = &self.data[offset..end];
        let checksum = match (self.src_addr, self.dst_addr) {
            (IpAddr::V4(src), IpAddr::V4(dst)) => Checksum::udp_ipv4(src, dst, segment),
            (IpAddr::V6(src), IpAddr::V6(dst)) => Checksum::udp_ipv6(src, dst, segment),
            _ => return,
        };
        self.data[offset + 6..offset + 8].copy_from_slice(&checksum.to_be_bytes());
    }

    /// End of the UDP datagram, bounded by the UDP length field
    fn udp_end(&self) -> usize {
        let offset = self.ip_header_len;
        let declared = usize::from(u16::from_be_bytes([
            self.data[offset + 4],
            self.data[offset + 5],
        ]));
        if declared >= UDP_HEADER_LEN && offset + declared <= self.data.len() {
            offset + declared
        } else {
            self.data.len()
        }
    }
}

fn swap_ranges(data: &mut [u8], a: usize, b: usize, len: usize) {
    for i in 0..len {
        data.swap(a + i, b + i);
    }
}
