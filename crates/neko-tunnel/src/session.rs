//! Tunnel session lifecycle and packet loop
//!
//! `Idle → ConfiguringInterface → Running → (Stopped | Faulted)`.
//!
//! One task runs the loop. Packets of a batch are handled in order and the
//! batch is written back before the next read, one output packet per input
//! packet.

use crate::error::{Result, TunnelError};
use neko_core::{Config, DnsFilter, Layout, LogStore, RuleStore};
use neko_platform::{FlowPacket, PacketFlow, TunnelSettings};
use parking_lot::RwLock;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, trace, warn};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Created, not started
    #[default]
    Idle,
    /// Applying interface settings
    ConfiguringInterface,
    /// Processing packets
    Running,
    /// Ended by a stop request or end of stream
    Stopped,
    /// Ended by an interface failure
    Faulted,
}

impl SessionState {
    /// Human-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::ConfiguringInterface => "configuring interface",
            SessionState::Running => "running",
            SessionState::Stopped => "stopped",
            SessionState::Faulted => "faulted",
        }
    }

    /// Check if the session can no longer change state
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Stopped | SessionState::Faulted)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a session needs besides its flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Settings applied to the interface
    pub settings: TunnelSettings,
    /// Packet layout
    pub layout: Layout,
    /// DNS port (layered layout)
    pub dns_port: u16,
    /// Rules file, read once at start
    pub rules_path: PathBuf,
    /// History file
    pub logs_path: PathBuf,
    /// History capacity
    pub log_capacity: usize,
    /// Seed history from the existing file
    pub resume_history: bool,
}

impl SessionConfig {
    /// Derive session settings from the application configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            settings: TunnelSettings::from_config(&config.tunnel)?,
            layout: config.filter.layout,
            dns_port: config.filter.dns_port,
            rules_path: config.storage.rules_path(),
            logs_path: config.storage.logs_path(),
            log_capacity: config.storage.log_capacity,
            resume_history: config.storage.resume_history,
        })
    }
}

/// Counters reported when a session ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Final state
    pub state: SessionState,
    /// Batches read and written back
    pub batches: u64,
    /// Packets processed
    pub packets: u64,
    /// Packets forwarded because they were not DNS queries
    pub passed_through: u64,
    /// Queries forwarded
    pub allowed: u64,
    /// Queries answered with a spoofed response
    pub blocked: u64,
    /// History writes that failed
    pub persistence_failures: u64,
}

/// Cloneable control handle for a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    state: Arc<RwLock<SessionState>>,
    stop: Arc<watch::Sender<bool>>,
}

impl SessionHandle {
    /// Request a cooperative stop
    ///
    /// A batch being processed is finished and written; a pending read is
    /// abandoned. Requests made before `run` make it stop right after
    /// configuring the interface.
    pub fn stop(&self) {
        if !self.stop.send_replace(true) {
            debug!("Stop requested");
        }
    }

    /// Check if a stop was requested
    pub fn is_stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }
}

/// A filtering session over one packet flow
pub struct TunnelSession<F> {
    flow: F,
    config: SessionConfig,
    state: Arc<RwLock<SessionState>>,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
    summary: SessionSummary,
}

impl<F: PacketFlow> TunnelSession<F> {
    /// Create an idle session
    pub fn new(flow: F, config: SessionConfig) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            flow,
            config,
            state: Arc::new(RwLock::new(SessionState::Idle)),
            stop_tx: Arc::new(stop_tx),
            stop_rx,
            summary: SessionSummary::default(),
        }
    }

    /// Get a control handle
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            state: Arc::clone(&self.state),
            stop: Arc::clone(&self.stop_tx),
        }
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Counters so far (final once `run` has returned)
    pub fn summary(&self) -> SessionSummary {
        self.summary
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Access the flow
    pub fn flow(&self) -> &F {
        &self.flow
    }

    /// Consume the session, returning the flow
    pub fn into_flow(self) -> F {
        self.flow
    }

    fn set_state(&mut self, state: SessionState) {
        *self.state.write() = state;
        self.summary.state = state;
        debug!(%state, "Session state changed");
    }

    /// Start the session and run until it stops or faults
    ///
    /// Loads the rules, opens the history, configures the interface and
    /// processes batches until a stop request, end of stream or an
    /// interface failure.
    #[instrument(name = "session", skip_all, fields(layout = ?self.config.layout))]
    pub async fn run(&mut self) -> Result<SessionSummary> {
        let current = self.state();
        if current != SessionState::Idle {
            return Err(TunnelError::AlreadyStarted(current));
        }

        let rules = RuleStore::load(&self.config.rules_path);
        let mut history = LogStore::open(
            &self.config.logs_path,
            self.config.log_capacity,
            self.config.resume_history,
        );
        let mut filter = DnsFilter::new(rules.rules(), self.config.layout, self.config.dns_port);
        info!(
            rules = rules.len(),
            active_patterns = filter.active_patterns(),
            history = history.len(),
            "Session starting"
        );

        self.set_state(SessionState::ConfiguringInterface);
        if let Err(e) = self.flow.configure(&self.config.settings).await {
            return Err(self.fault(TunnelError::Configure(e)).await);
        }

        self.set_state(SessionState::Running);
        info!(
            remote = %self.config.settings.remote_address,
            dns = ?self.config.settings.dns.servers,
            "Tunnel running"
        );

        match self.read_loop(&mut filter, &mut history).await {
            Ok(()) => {
                if let Err(e) = self.flow.close().await {
                    warn!(error = %e, "Failed to close interface");
                }
                self.set_state(SessionState::Stopped);
                info!(
                    batches = self.summary.batches,
                    packets = self.summary.packets,
                    blocked = self.summary.blocked,
                    "Session stopped"
                );
                Ok(self.summary)
            }
            Err(e) => Err(self.fault(e).await),
        }
    }

    async fn read_loop(&mut self, filter: &mut DnsFilter, history: &mut LogStore) -> Result<()> {
        let mut stop_rx = self.stop_rx.clone();

        loop {
            let stopped = *stop_rx.borrow_and_update();
            if stopped {
                debug!("Stop requested, not reading further");
                return Ok(());
            }

            let batch = tokio::select! {
                biased;
                () = stop_requested(&mut stop_rx) => {
                    debug!("Stop requested, abandoning pending read");
                    return Ok(());
                }
                batch = self.flow.read_packets() => batch.map_err(TunnelError::Read)?,
            };

            let Some(batch) = batch else {
                info!("Interface reported end of stream");
                return Ok(());
            };

            let output = self.process_batch(batch, filter, history);
            self.flow
                .write_packets(output)
                .await
                .map_err(TunnelError::Write)?;
            self.summary.batches += 1;
        }
    }

    fn process_batch(
        &mut self,
        batch: Vec<FlowPacket>,
        filter: &mut DnsFilter,
        history: &mut LogStore,
    ) -> Vec<FlowPacket> {
        trace!(size = batch.len(), "Processing batch");
        let mut output = Vec::with_capacity(batch.len());

        for packet in batch {
            let processed = filter.process(packet.data.clone());

            if let Some((domain, blocked)) = processed.verdict.decision() {
                if blocked {
                    info!(domain, "Blocked DNS query");
                }
                if let Err(e) = history.record(domain, blocked) {
                    self.summary.persistence_failures += 1;
                    warn!(error = %e, domain, "Failed to persist decision history");
                }
            }

            output.push(packet.with_data(processed.packet));
        }

        let stats = filter.stats();
        self.summary.packets = stats.packets_processed;
        self.summary.passed_through = stats.passed_through;
        self.summary.allowed = stats.queries_allowed;
        self.summary.blocked = stats.queries_blocked;

        output
    }

    async fn fault(&mut self, err: TunnelError) -> TunnelError {
        error!(error = %err, "Session faulted");
        if let Err(e) = self.flow.close().await {
            debug!(error = %e, "Failed to close interface after fault");
        }
        self.set_state(SessionState::Faulted);
        err
    }
}

impl<F> fmt::Debug for TunnelSession<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelSession")
            .field("config", &self.config)
            .field("state", &*self.state.read())
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

/// Resolves once the stop flag is set
async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        let stopped = *rx.borrow_and_update();
        if stopped {
            return;
        }
        if rx.changed().await.is_err() {
            // Every sender is gone, so the flag can no longer change
            std::future::pending::<()>().await;
        }
    }
}
