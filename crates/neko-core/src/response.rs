//! Spoofed responses for blocked queries
//!
//! The response is the query itself with the QR and AA bits raised. Counts
//! and RCODE are left as the query had them, which reads as "no error, no
//! answers" to a stub resolver.

use crate::dns::{DnsFlags, Layout};
use crate::error::Result;
use crate::packet::Packet;
use bytes::Bytes;

/// Bits OR-ed into byte 2 of the DNS message (high byte of the flags word)
#[allow(clippy::cast_possible_truncation)]
pub const RESPONSE_FLAGS_HIGH: u8 = ((DnsFlags::QR.bits() | DnsFlags::AA.bits()) >> 8) as u8;

/// Offset of the flags high byte inside a DNS message
const FLAGS_HIGH_OFFSET: usize = 2;

/// Turn a DNS query message into its spoofed response
///
/// Buffers too short to hold the flags byte are returned unchanged.
pub fn synthesize(query: &[u8]) -> Vec<u8> {
    let mut response = query.to_vec();
    if let Some(flags) = response.get_mut(FLAGS_HIGH_OFFSET) {
        *flags |= RESPONSE_FLAGS_HIGH;
    }
    response
}

/// Build the packet written back in place of a blocked query
///
/// With [`Layout::FixedOffset`] the whole buffer is the DNS message and this
/// is [`synthesize`]. With [`Layout::Layered`] the reply is also readdressed
/// to the querier and its checksums are recomputed.
pub fn spoof_packet(packet: &[u8], layout: Layout, message_offset: usize) -> Result<Bytes> {
    match layout {
        Layout::FixedOffset => Ok(Bytes::from(synthesize(packet))),
        Layout::Layered => {
            let mut reply = Packet::from_bytes(packet)?;
            reply.swap_endpoints();
            if let Some(flags) = reply
                .as_bytes_mut()
                .get_mut(message_offset + FLAGS_HIGH_OFFSET)
            {
                *flags |= RESPONSE_FLAGS_HIGH;
            }
            reply.update_checksums();
            Ok(reply.freeze())
        }
    }
}
