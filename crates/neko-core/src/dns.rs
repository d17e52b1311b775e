//! DNS query decoding
//!
//! Just enough of RFC 1035 to recover the question name of an outbound query.
//!
//! ```text
//! +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//! |                      ID                       |  2 bytes
//! +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//! |QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE   |  2 bytes (flags)
//! +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//! |            QDCOUNT / ANCOUNT / NSCOUNT / ARCOUNT |  8 bytes
//! +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//! |                 Question name ...             |  starts at offset 12
//! ```
//!
//! Two layouts are supported. [`Layout::Layered`] decodes the IP and UDP
//! headers first and locates the DNS message inside the UDP payload.
//! [`Layout::FixedOffset`] treats the whole buffer as the DNS message and
//! starts reading labels at [`DNS_HEADER_LEN`] without validating anything
//! in front of it.

use crate::packet::{ports, Packet};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of the fixed DNS header; the question name starts right after it
pub const DNS_HEADER_LEN: usize = 12;

/// Longest label allowed by RFC 1035
pub const MAX_LABEL_LEN: usize = 63;

/// Length bytes with both top bits set are compression pointers
const POINTER_MASK: u8 = 0xC0;

bitflags! {
    /// DNS header flag bits (16-bit field at offset 2, network byte order)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DnsFlags: u16 {
        /// Message is a response
        const QR = 0x8000;
        /// Authoritative answer
        const AA = 0x0400;
        /// Truncated
        const TC = 0x0200;
        /// Recursion desired
        const RD = 0x0100;
        /// Recursion available
        const RA = 0x0080;
        /// Opcode bits
        const OPCODE = 0x7800;
        /// Response code bits
        const RCODE = 0x000F;
    }
}

/// Fixed DNS message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsHeader {
    /// Transaction ID
    pub id: u16,
    /// Flags
    pub flags: DnsFlags,
    /// Number of questions
    pub qdcount: u16,
    /// Number of answers
    pub ancount: u16,
    /// Number of authority records
    pub nscount: u16,
    /// Number of additional records
    pub arcount: u16,
}

impl DnsHeader {
    /// Parse the header at the start of a DNS message
    pub fn parse(message: &[u8]) -> Result<Self, ExtractError> {
        if message.len() < DNS_HEADER_LEN {
            return Err(ExtractError::Truncated {
                expected: DNS_HEADER_LEN,
                actual: message.len(),
            });
        }

        let word = |at: usize| u16::from_be_bytes([message[at], message[at + 1]]);
        Ok(Self {
            id: word(0),
            flags: DnsFlags::from_bits_retain(word(2)),
            qdcount: word(4),
            ancount: word(6),
            nscount: word(8),
            arcount: word(10),
        })
    }

    /// Check if the header describes a query (QR bit clear)
    pub fn is_query(&self) -> bool {
        !self.flags.contains(DnsFlags::QR)
    }
}

/// Reason a packet was not recognised as a DNS query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// Buffer ends before a required structure
    #[error("truncated: expected at least {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum expected size
        expected: usize,
        /// Actual size
        actual: usize,
    },

    /// IP or UDP headers could not be decoded
    #[error("malformed packet: {0}")]
    Malformed(String),

    /// Transport is not UDP
    #[error("not a UDP datagram")]
    NotUdp,

    /// UDP destination port is not the DNS port
    #[error("destination port {0} is not DNS")]
    NotDnsPort(u16),

    /// QR bit set: the message is a response
    #[error("message is a response, not a query")]
    NotAQuery,

    /// Header declares no question
    #[error("query has no question")]
    NoQuestion,

    /// Label runs past the buffer or the name has no zero-length terminator
    #[error("question name not terminated (label at offset {offset})")]
    Unterminated {
        /// Offset of the offending length byte
        offset: usize,
    },

    /// Compressed names are not followed
    #[error("compression pointer at offset {offset}")]
    CompressedName {
        /// Offset of the pointer
        offset: usize,
    },

    /// Label length above 63
    #[error("label of length {len} at offset {offset} exceeds 63 bytes")]
    LabelTooLong {
        /// Offset of the length byte
        offset: usize,
        /// Declared length
        len: u8,
    },

    /// Label bytes are not valid UTF-8
    #[error("label at offset {offset} is not valid text")]
    InvalidLabel {
        /// Offset of the label bytes
        offset: usize,
    },

    /// Name consists only of the root label
    #[error("question name is empty")]
    EmptyName,
}

impl From<crate::Error> for ExtractError {
    fn from(err: crate::Error) -> Self {
        match err {
            crate::Error::PacketTooSmall { expected, actual } => {
                Self::Truncated { expected, actual }
            }
            other => Self::Malformed(other.to_string()),
        }
    }
}

/// Where the DNS message is found inside a packet read from the interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    /// Decode IP header, then UDP header, then the DNS message
    #[default]
    Layered,
    /// The buffer starts with the DNS message; labels begin at offset 12
    FixedOffset,
}

impl Layout {
    /// Parse from a configuration or CLI string
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "layered" => Some(Self::Layered),
            "fixed-offset" | "fixed" => Some(Self::FixedOffset),
            _ => None,
        }
    }
}

/// A located DNS query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuery {
    /// Dot-joined question name
    pub domain: String,
    /// Offset of the DNS message inside the packet
    pub message_offset: usize,
}

/// Read the question name of a DNS message
///
/// Labels are read from [`DNS_HEADER_LEN`] until the zero-length terminator.
/// Compression pointers are rejected rather than followed, and so are length
/// bytes above [`MAX_LABEL_LEN`].
pub fn question_name(message: &[u8]) -> Result<String, ExtractError> {
    if message.len() <= DNS_HEADER_LEN {
        return Err(ExtractError::Truncated {
            expected: DNS_HEADER_LEN + 1,
            actual: message.len(),
        });
    }

    let mut name = String::new();
    let mut cursor = DNS_HEADER_LEN;

    loop {
        let Some(&len) = message.get(cursor) else {
            return Err(ExtractError::Unterminated { offset: cursor });
        };
        if len == 0 {
            break;
        }
        if len & POINTER_MASK == POINTER_MASK {
            return Err(ExtractError::CompressedName { offset: cursor });
        }
        if usize::from(len) > MAX_LABEL_LEN {
            return Err(ExtractError::LabelTooLong {
                offset: cursor,
                len,
            });
        }

        let start = cursor + 1;
        let end = start + usize::from(len);
        let Some(label) = message.get(start..end) else {
            return Err(ExtractError::Unterminated { offset: cursor });
        };
        let label =
            std::str::from_utf8(label).map_err(|_| ExtractError::InvalidLabel { offset: start })?;

        if !name.is_empty() {
            name.push('.');
        }
        name.push_str(label);
        cursor = end;
    }

    if name.is_empty() {
        return Err(ExtractError::EmptyName);
    }
    Ok(name)
}

/// Extracts the queried domain from raw interface packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainExtractor {
    layout: Layout,
    dns_port: u16,
}

impl Default for DomainExtractor {
    fn default() -> Self {
        Self::new(Layout::default(), ports::DNS)
    }
}

impl DomainExtractor {
    /// Create an extractor for the given layout and DNS port
    pub fn new(layout: Layout, dns_port: u16) -> Self {
        Self { layout, dns_port }
    }

    /// Get the configured layout
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Extract the queried domain, or the reason the packet is not a query
    pub fn extract_domain(&self, packet: &[u8]) -> Result<String, ExtractError> {
        self.locate(packet).map(|query| query.domain)
    }

    /// Locate the DNS query inside a packet
    pub fn locate(&self, packet: &[u8]) -> Result<DnsQuery, ExtractError> {
        match self.layout {
            Layout::FixedOffset => Ok(DnsQuery {
                domain: question_name(packet)?,
                message_offset: 0,
            }),
            Layout::Layered => self.locate_layered(packet),
        }
    }

    fn locate_layered(&self, raw: &[u8]) -> Result<DnsQuery, ExtractError> {
        let packet = Packet::from_bytes(raw)?;
        if !packet.is_udp() {
            return Err(ExtractError::NotUdp);
        }
        if packet.dst_port != self.dns_port {
            return Err(ExtractError::NotDnsPort(packet.dst_port));
        }

        let message = packet.payload();
        let header = DnsHeader::parse(message)?;
        if !header.is_query() {
            return Err(ExtractError::NotAQuery);
        }
        if header.qdcount == 0 {
            return Err(ExtractError::NoQuestion);
        }

        Ok(DnsQuery {
            domain: question_name(message)?,
            message_offset: packet.payload_offset(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(labels: &[&str]) -> Vec<u8> {
        let mut msg = vec![0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
        for label in labels {
            msg.push(u8::try_from(label.len()).unwrap());
            msg.extend_from_slice(label.as_bytes());
        }
        msg.push(0);
        msg.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
        msg
    }

    #[test]
    fn test_question_name() {
        let msg = message(&["static", "ads", "example", "com"]);
        assert_eq!(question_name(&msg).unwrap(), "static.ads.example.com");
    }

    #[test]
    fn test_question_name_too_short() {
        let msg = [0u8; 12];
        assert!(matches!(
            question_name(&msg),
            Err(ExtractError::Truncated { actual: 12, .. })
        ));
    }

    #[test]
    fn test_question_name_unterminated() {
        let mut msg = message(&["example", "com"]);
        msg.truncate(msg.len() - 5); // drop terminator and QTYPE/QCLASS
        assert!(matches!(
            question_name(&msg),
            Err(ExtractError::Unterminated { .. })
        ));
    }

    #[test]
    fn test_question_name_label_overrun() {
        let mut msg = message(&["example"]);
        msg.truncate(DNS_HEADER_LEN + 4);
        assert_eq!(
            question_name(&msg),
            Err(ExtractError::Unterminated {
                offset: DNS_HEADER_LEN
            })
        );
    }

    #[test]
    fn test_question_name_compressed() {
        let mut msg = message(&[]);
        msg[DNS_HEADER_LEN] = 0xC0;
        assert!(matches!(
            question_name(&msg),
            Err(ExtractError::CompressedName { offset: 12 })
        ));
    }

    #[test]
    fn test_question_name_label_over_limit() {
        let mut msg = message(&["a".repeat(70).as_str()]);
        assert_eq!(
            question_name(&msg),
            Err(ExtractError::LabelTooLong {
                offset: DNS_HEADER_LEN,
                len: 70
            })
        );

        msg[DNS_HEADER_LEN] = 0xBF;
        assert!(matches!(
            question_name(&msg),
            Err(ExtractError::LabelTooLong { len: 0xBF, .. })
        ));
    }

    #[test]
    fn test_question_name_invalid_utf8() {
        let mut msg = message(&["ab"]);
        msg[DNS_HEADER_LEN + 1] = 0xFF;
        assert!(matches!(
            question_name(&msg),
            Err(ExtractError::InvalidLabel { .. })
        ));
    }

    #[test]
    fn test_question_name_root_only() {
        let msg = message(&[]);
        assert_eq!(question_name(&msg), Err(ExtractError::EmptyName));
    }

    #[test]
    fn test_header_parse() {
        let msg = message(&["a"]);
        let header = DnsHeader::parse(&msg).unwrap();
        assert_eq!(header.id, 0x1234);
        assert!(header.is_query());
        assert!(header.flags.contains(DnsFlags::RD));
        assert_eq!(header.qdcount, 1);
    }

    #[test]
    fn test_fixed_offset_skips_validation() {
        let mut msg = message(&["example", "com"]);
        msg[2] = 0x81; // QR set, still parsed in fixed-offset layout
        let extractor = DomainExtractor::new(Layout::FixedOffset, 53);
        assert_eq!(extractor.extract_domain(&msg).unwrap(), "example.com");
    }

    #[test]
    fn test_layout_from_name() {
        assert_eq!(Layout::from_name("Layered"), Some(Layout::Layered));
        assert_eq!(Layout::from_name("fixed-offset"), Some(Layout::FixedOffset));
        assert_eq!(Layout::from_name("other"), None);
    }
}
