//! Logging initialization

use anyhow::{Context, Result};
use neko_core::config::LoggingConfig;
use std::path::Path;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::args::{Args, LogFormat};

/// Resolve the level from CLI flags, falling back to the configured one
fn level(args: &Args, config: &LoggingConfig) -> Level {
    if args.quiet {
        return Level::ERROR;
    }
    match args.verbose {
        0 => Level::from_str(&config.level).unwrap_or(Level::INFO),
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    std::fs::File::create(path)
        .with_context(|| format!("Failed to create log file: {}", path.display()))
}

/// Initialize logging based on CLI arguments and the `[logging]` section
///
/// Console output goes to stderr so command output on stdout stays clean.
pub fn init(args: &Args, config: &LoggingConfig) -> Result<()> {
    let level = level(args, config);

    // Build env filter
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let format = args.log_format.unwrap_or(if config.json_format {
        LogFormat::Json
    } else {
        LogFormat::Text
    });
    let log_file = args.log_file.as_deref().or(config.file.as_deref());

    // Set up subscriber based on format
    match format {
        LogFormat::Text => {
            let subscriber = tracing_subscriber::registry().with(env_filter).with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(args.verbose >= 2)
                    .with_thread_ids(args.verbose >= 3)
                    .with_file(args.verbose >= 3)
                    .with_line_number(args.verbose >= 3),
            );

            if let Some(path) = log_file {
                let file = open_log_file(path)?;
                let file_layer = fmt::layer().with_ansi(false).with_writer(file);
                subscriber.with(file_layer).init();
            } else {
                subscriber.init();
            }
        }
        LogFormat::Json => {
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr));

            if let Some(path) = log_file {
                let file = open_log_file(path)?;
                let file_layer = fmt::layer().json().with_writer(file);
                subscriber.with(file_layer).init();
            } else {
                subscriber.init();
            }
        }
        LogFormat::Compact => {
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact().with_writer(std::io::stderr));
            subscriber.init();
        }
    }

    Ok(())
}
