//! Packet flow replayed from a text capture
//!
//! One hex-encoded packet per line, optionally prefixed with the address
//! family tag (`4` or `6`) and a space. A blank line ends a batch. Lines
//! starting with `#` are comments. Written packets are emitted in the same
//! format, so the output of one run can be replayed by the next.
//!
//! ```text
//! # one IPv4 query, then two packets in a second batch
//! 4 4500003d...
//!
//! 45000040...
//! 6 6000000000...
//! ```

use crate::traits::{AddressFamily, FlowPacket, PacketFlow, TunnelSettings};
use crate::{PlatformError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Format one packet as a replay line (without the newline)
pub fn format_packet(packet: &FlowPacket) -> String {
    format!("{} {}", packet.family.tag(), hex::encode(&packet.data))
}

/// Parse replay text into batches
pub fn parse_batches(input: &str) -> Result<Vec<Vec<FlowPacket>>> {
    let mut batches = Vec::new();
    let mut current = Vec::new();

    for (index, raw) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();

        if line.starts_with('#') {
            continue;
        }
        if line.is_empty() {
            if !current.is_empty() {
                batches.push(std::mem::take(&mut current));
            }
            continue;
        }

        current.push(parse_line(line, line_no)?);
    }

    if !current.is_empty() {
        batches.push(current);
    }
    Ok(batches)
}

fn parse_line(line: &str, line_no: usize) -> Result<FlowPacket> {
    let mut fields = line.split_whitespace();
    let (tag, payload) = match (fields.next(), fields.next(), fields.next()) {
        (Some(payload), None, None) => (None, payload),
        (Some(tag), Some(payload), None) => (Some(tag), payload),
        _ => {
            return Err(PlatformError::InvalidReplay {
                line: line_no,
                message: "expected `[4|6] <hex>`".into(),
            })
        }
    };

    let data = hex::decode(payload).map_err(|source| PlatformError::HexDecode {
        line: line_no,
        source,
    })?;
    if data.is_empty() {
        return Err(PlatformError::InvalidReplay {
            line: line_no,
            message: "empty packet".into(),
        });
    }

    match tag {
        None => Ok(FlowPacket::detect(data)),
        Some(tag) => {
            let family =
                AddressFamily::from_tag(tag).ok_or_else(|| PlatformError::InvalidReplay {
                    line: line_no,
                    message: format!("unknown address family `{tag}`"),
                })?;
            Ok(FlowPacket::new(data, family))
        }
    }
}

type Output = Box<dyn AsyncWrite + Unpin + Send>;

/// Flow that serves batches from a capture and records what is written
pub struct ReplayFlow {
    batches: VecDeque<Vec<FlowPacket>>,
    output: Option<Output>,
    batch_delay: Duration,
    settings: Option<TunnelSettings>,
    packets_written: usize,
    closed: bool,
}

impl ReplayFlow {
    /// Create a flow serving `batches`; writes are counted and discarded
    pub fn new(batches: Vec<Vec<FlowPacket>>) -> Self {
        Self {
            batches: batches.into(),
            output: None,
            batch_delay: Duration::ZERO,
            settings: None,
            packets_written: 0,
            closed: false,
        }
    }

    /// Create a flow from replay text
    pub fn from_text(input: &str) -> Result<Self> {
        Ok(Self::new(parse_batches(input)?))
    }

    /// Create a flow from a replay file
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = tokio::fs::read_to_string(path).await?;
        let flow = Self::from_text(&input)?;
        info!(path = %path.display(), batches = flow.remaining(), "Loaded replay capture");
        Ok(flow)
    }

    /// Emit written packets to `output` in replay format
    #[must_use]
    pub fn with_output<W>(mut self, output: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.output = Some(Box::new(output));
        self
    }

    /// Wait this long before handing out each batch
    #[must_use]
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    /// Batches not yet read
    pub fn remaining(&self) -> usize {
        self.batches.len()
    }

    /// Packets written so far
    pub fn packets_written(&self) -> usize {
        self.packets_written
    }

    /// Settings applied by the session, if any
    pub fn settings(&self) -> Option<&TunnelSettings> {
        self.settings.as_ref()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(PlatformError::Closed);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ReplayFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayFlow")
            .field("remaining", &self.batches.len())
            .field("has_output", &self.output.is_some())
            .field("batch_delay", &self.batch_delay)
            .field("packets_written", &self.packets_written)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PacketFlow for ReplayFlow {
    async fn configure(&mut self, settings: &TunnelSettings) -> Result<()> {
        self.ensure_open()?;
        debug!(
            remote = %settings.remote_address,
            dns = ?settings.dns.servers,
            mtu = settings.mtu,
            "Replay interface configured"
        );
        self.settings = Some(settings.clone());
        Ok(())
    }

    async fn read_packets(&mut self) -> Result<Option<Vec<FlowPacket>>> {
        self.ensure_open()?;
        if self.batches.is_empty() {
            return Ok(None);
        }
        if !self.batch_delay.is_zero() {
            tokio::time::sleep(self.batch_delay).await;
        }
        Ok(self.batches.pop_front())
    }

    async fn write_packets(&mut self, packets: Vec<FlowPacket>) -> Result<()> {
        self.ensure_open()?;
        self.packets_written += packets.len();

        let Some(output) = self.output.as_mut() else {
            return Ok(());
        };

        let mut text = String::new();
        for packet in &packets {
            text.push_str(&format_packet(packet));
            text.push('\n');
        }
        text.push('\n');

        output
            .write_all(text.as_bytes())
            .await
            .map_err(|e| PlatformError::WriteFailed(e.to_string()))?;
        output
            .flush()
            .await
            .map_err(|e| PlatformError::WriteFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(output) = self.output.as_mut() {
            output.flush().await?;
        }
        debug!(
            written = self.packets_written,
            unread = self.batches.len(),
            "Replay interface closed"
        );
        Ok(())
    }
}
