//! Internet checksum helpers

use std::net::{Ipv4Addr, Ipv6Addr};

/// Checksum calculations for rewritten packets
pub struct Checksum;

impl Checksum {
    /// Calculate Internet Checksum (RFC 1071)
    pub fn internet_checksum(data: &[u8]) -> u16 {
        let mut sum: u32 = 0;
        let mut chunks = data.chunks_exact(2);

        for chunk in &mut chunks {
            sum += u32::from(u16::from_be_bytes([chunk[0], chunk[1]]));
        }

        // Handle odd byte
        if let [last] = chunks.remainder() {
            sum += u32::from(*last) << 8;
        }

        // Fold 32-bit sum to 16 bits
        while sum >> 16 != 0 {
            sum = (sum & 0xFFFF) + (sum >> 16);
        }

        #[allow(clippy::cast_possible_truncation)]
        let folded = sum as u16;
        !folded
    }

    /// Calculate IPv4 header checksum, ignoring the stored checksum field
    pub fn ipv4_header(header: &[u8]) -> u16 {
        let mut header_copy = header.to_vec();
        if header_copy.len() >= 12 {
            header_copy[10] = 0;
            header_copy[11] = 0;
        }
        Self::internet_checksum(&header_copy)
    }

    /// Calculate UDP checksum with the IPv4 pseudo-header
    ///
    /// The checksum field inside `udp_segment` must be zeroed by the caller.
    pub fn udp_ipv4(src: Ipv4Addr, dst: Ipv4Addr, udp_segment: &[u8]) -> u16 {
        let mut pseudo = Vec::with_capacity(12 + udp_segment.len());
        pseudo.extend_from_slice(&src.octets());
        pseudo.extend_from_slice(&dst.octets());
        pseudo.push(0); // Reserved
        pseudo.push(17); // Protocol (UDP)
        #[allow(clippy::cast_possible_truncation)]
        pseudo.extend_from_slice(&(udp_segment.len() as u16).to_be_bytes());
        pseudo.extend_from_slice(udp_segment);

        Self::non_zero(Self::internet_checksum(&pseudo))
    }

    /// Calculate UDP checksum with the IPv6 pseudo-header (RFC 8200 §8.1)
    pub fn udp_ipv6(src: Ipv6Addr, dst: Ipv6Addr, udp_segment: &[u8]) -> u16 {
        let mut pseudo = Vec::with_capacity(40 + udp_segment.len());
        pseudo.extend_from_slice(&src.octets());
        pseudo.extend_from_slice(&dst.octets());
        #[allow(clippy::cast_possible_truncation)]
        pseudo.extend_from_slice(&(udp_segment.len() as u32).to_be_bytes());
        pseudo.extend_from_slice(&[0, 0, 0, 17]);
        pseudo.extend_from_slice(udp_segment);

        Self::non_zero(Self::internet_checksum(&pseudo))
    }

    /// A computed UDP checksum of zero is transmitted as all ones
    fn non_zero(checksum: u16) -> u16 {
        if checksum == 0 {
            0xFFFF
        } else {
            checksum
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internet_checksum_rfc1071() {
        // Example from RFC 1071
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(Checksum::internet_checksum(&data), 0x220d);
    }

    #[test]
    fn test_internet_checksum_empty() {
        assert_eq!(Checksum::internet_checksum(&[]), 0xFFFF);
    }

    #[test]
    fn test_ipv4_header_checksum_verifies() {
        let mut header = [
            0x45, 0x00, 0x00, 0x3c, 0x1c, 0x46, 0x40, 0x00, 0x40, 0x06, 0x00, 0x00, 0xac, 0x10,
            0x0a, 0x63, 0xac, 0x10, 0x0a, 0x0c,
        ];
        let checksum = Checksum::ipv4_header(&header);
        assert_eq!(checksum, 0xb1e6);

        header[10..12].copy_from_slice(&checksum.to_be_bytes());
        // A header carrying its own checksum sums to zero
        assert_eq!(Checksum::internet_checksum(&header), 0);
    }

    #[test]
    fn test_udp_checksum_verifies() {
        let src = Ipv4Addr::new(10, 0, 0, 2);
        let dst = Ipv4Addr::new(8, 8, 8, 8);
        let mut segment = vec![0xd4, 0x31, 0x00, 0x35, 0x00, 0x0c, 0x00, 0x00, 0xab, 0xcd, 0x01, 0x00];
        let checksum = Checksum::udp_ipv4(src, dst, &segment);
        segment[6..8].copy_from_slice(&checksum.to_be_bytes());

        let mut pseudo = Vec::new();
        pseudo.extend_from_slice(&src.octets());
        pseudo.extend_from_slice(&dst.octets());
        pseudo.extend_from_slice(&[0, 17, 0, 12]);
        pseudo.extend_from_slice(&segment);
        assert_eq!(Checksum::internet_checksum(&pseudo), 0);
    }
}
