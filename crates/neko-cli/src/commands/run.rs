//! Run command - filter a packet capture through a tunnel session

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use neko_core::{Config, Layout};
use neko_platform::ReplayFlow;
use neko_tunnel::{SessionConfig, SessionState, SessionSummary, TunnelSession};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::args::parse_layout;

/// Run command arguments
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Replay capture supplying the packet batches
    #[arg(short, long, value_name = "FILE")]
    pub replay: PathBuf,

    /// Write processed batches here in replay format ("-" for stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Pause before each batch, in milliseconds
    #[arg(long, default_value_t = 0)]
    pub batch_delay_ms: u64,

    /// Packet layout: layered or fixed-offset (default: from config)
    #[arg(long, value_parser = parse_layout)]
    pub layout: Option<Layout>,

    /// DNS port for the layered layout (default: from config)
    #[arg(long)]
    pub dns_port: Option<u16>,

    /// Validate configuration and capture, then exit
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(layout) = self.layout {
            config.filter.layout = layout;
        }
        if let Some(port) = self.dns_port {
            config.filter.dns_port = port;
        }
    }
}

/// Execute the run command
pub fn execute(args: RunArgs, mut config: Config) -> Result<()> {
    info!("Starting NekoFilter...");

    args.apply_overrides(&mut config);
    let session_config = SessionConfig::from_config(&config).context("Invalid configuration")?;
    info!(
        layout = ?session_config.layout,
        rules = %session_config.rules_path.display(),
        logs = %session_config.logs_path.display(),
        "Loaded configuration"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let summary = runtime.block_on(run_session(&args, session_config))?;
    if let Some(summary) = summary {
        print_summary(&summary);
        info!("NekoFilter stopped");
    }
    Ok(())
}

async fn run_session(
    args: &RunArgs,
    session_config: SessionConfig,
) -> Result<Option<SessionSummary>> {
    let flow = ReplayFlow::from_file(&args.replay)
        .await
        .with_context(|| format!("Failed to load replay capture {}", args.replay.display()))?
        .with_batch_delay(Duration::from_millis(args.batch_delay_ms));

    if args.dry_run {
        warn!("Dry run mode - no packets will be processed");
        info!(batches = flow.remaining(), "Configuration validated successfully");
        return Ok(None);
    }

    let flow = match args.output.as_deref() {
        None => flow,
        Some(path) if path == Path::new("-") => flow.with_output(tokio::io::stdout()),
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create output {}", path.display()))?;
            flow.with_output(file)
        }
    };

    let mut session = TunnelSession::new(flow, session_config);
    let handle = session.handle();

    ctrlc::set_handler(move || {
        info!("Received interrupt signal, shutting down...");
        handle.stop();
    })
    .context("Failed to set signal handler")?;

    let summary = session.run().await.context("Tunnel session failed")?;
    Ok(Some(summary))
}

fn print_summary(summary: &SessionSummary) {
    let state = match summary.state {
        SessionState::Stopped => summary.state.as_str().green(),
        SessionState::Faulted => summary.state.as_str().red(),
        _ => summary.state.as_str().yellow(),
    };

    eprintln!();
    eprintln!("{}", "─".repeat(44).bright_black());
    eprintln!("Session {}", state.bold());
    eprintln!("  Batches:        {}", summary.batches);
    eprintln!("  Packets:        {}", summary.packets);
    eprintln!("  Passed through: {}", summary.passed_through);
    eprintln!("  Allowed:        {}", summary.allowed.to_string().green());
    eprintln!("  Blocked:        {}", summary.blocked.to_string().red());
    if summary.persistence_failures > 0 {
        eprintln!(
            "  {} {} history writes failed",
            "!".yellow(),
            summary.persistence_failures
        );
    }
    eprintln!("{}", "─".repeat(44).bright_black());
}
