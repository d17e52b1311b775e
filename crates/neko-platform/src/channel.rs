//! In-memory packet flow over tokio channels
//!
//! [`ChannelFlow`] is handed to a tunnel session; the matching
//! [`ChannelPeer`] plays the operating system, injecting batches and
//! collecting what the session writes back. Dropping the peer's sending
//! side ends the stream.

use crate::traits::{FlowPacket, PacketFlow, TunnelSettings};
use crate::{PlatformError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Default)]
struct Shared {
    settings: Mutex<Option<TunnelSettings>>,
    closed: AtomicBool,
}

/// Session side of an in-memory interface
#[derive(Debug)]
pub struct ChannelFlow {
    inbound: mpsc::Receiver<Vec<FlowPacket>>,
    outbound: mpsc::UnboundedSender<Vec<FlowPacket>>,
    shared: Arc<Shared>,
}

/// System side of an in-memory interface
#[derive(Debug)]
pub struct ChannelPeer {
    inbound: Option<mpsc::Sender<Vec<FlowPacket>>>,
    outbound: mpsc::UnboundedReceiver<Vec<FlowPacket>>,
    shared: Arc<Shared>,
}

impl ChannelFlow {
    /// Create a connected flow and peer
    ///
    /// `buffer` is the number of batches the peer may queue ahead of reads.
    pub fn pair(buffer: usize) -> (ChannelFlow, ChannelPeer) {
        let (in_tx, in_rx) = mpsc::channel(buffer.max(1));
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());

        let flow = ChannelFlow {
            inbound: in_rx,
            outbound: out_tx,
            shared: Arc::clone(&shared),
        };
        let peer = ChannelPeer {
            inbound: Some(in_tx),
            outbound: out_rx,
            shared,
        };
        (flow, peer)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(PlatformError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl PacketFlow for ChannelFlow {
    async fn configure(&mut self, settings: &TunnelSettings) -> Result<()> {
        self.ensure_open()?;
        *self.shared.settings.lock() = Some(settings.clone());
        Ok(())
    }

    async fn read_packets(&mut self) -> Result<Option<Vec<FlowPacket>>> {
        self.ensure_open()?;
        Ok(self.inbound.recv().await)
    }

    async fn write_packets(&mut self, packets: Vec<FlowPacket>) -> Result<()> {
        self.ensure_open()?;
        self.outbound
            .send(packets)
            .map_err(|_| PlatformError::WriteFailed("peer disconnected".into()))
    }

    async fn close(&mut self) -> Result<()> {
        if !self.shared.closed.swap(true, Ordering::AcqRel) {
            self.inbound.close();
            debug!("Channel flow closed");
        }
        Ok(())
    }
}

impl ChannelPeer {
    /// Queue a batch for the session to read
    pub async fn send_batch(&self, packets: Vec<FlowPacket>) -> Result<()> {
        let sender = self.inbound.as_ref().ok_or(PlatformError::Closed)?;
        sender.send(packets).await.map_err(|_| PlatformError::Closed)
    }

    /// Signal end-of-stream; the session's next read returns `None`
    pub fn finish(&mut self) {
        self.inbound = None;
    }

    /// Wait for the next batch written by the session
    ///
    /// Returns `None` once the session side has been dropped.
    pub async fn recv_written(&mut self) -> Option<Vec<FlowPacket>> {
        self.outbound.recv().await
    }

    /// Take a written batch if one is ready
    pub fn try_recv_written(&mut self) -> Option<Vec<FlowPacket>> {
        self.outbound.try_recv().ok()
    }

    /// Settings applied by the session, if any
    pub fn settings(&self) -> Option<TunnelSettings> {
        self.shared.settings.lock().clone()
    }

    /// Check if the session closed the interface
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}
