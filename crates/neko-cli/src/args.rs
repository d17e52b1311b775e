//! Command-line argument parsing

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, ValueEnum};
use neko_core::{Config, Layout};
use std::path::PathBuf;
use tracing::debug;

use crate::commands::Command;

/// NekoFilter - local DNS content filter
///
/// Filters DNS queries flowing through a virtual tunnel interface against
/// substring block rules and answers blocked queries locally.
#[derive(Parser, Debug)]
#[command(name = "nekofilter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Configuration source
    #[command(flatten)]
    pub source: ConfigSource,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format for logs (default: from config)
    #[arg(long, value_enum, global = true)]
    pub log_format: Option<LogFormat>,

    /// Log file path (default: from config)
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Run in quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text
    Text,
    /// JSON format
    Json,
    /// Compact format
    Compact,
}

/// Where the configuration comes from
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ConfigSource {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE", env = "NEKOFILTER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory holding rules.json and logs.json (overrides config)
    #[arg(short = 'd', long, value_name = "DIR", env = "NEKOFILTER_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,
}

impl ConfigSource {
    /// Load the configuration: explicit file, then search paths, then defaults
    pub fn load(&self) -> Result<Config> {
        let mut config = if let Some(ref path) = self.config {
            Config::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        } else if let Some(path) = find_config_file() {
            debug!(path = %path.display(), "Using discovered config file");
            Config::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        } else {
            Config::default()
        };

        if let Some(ref dir) = self.data_dir {
            config.storage.dir.clone_from(dir);
        }
        Ok(config)
    }
}

/// Parse a `--layout` value
pub fn parse_layout(name: &str) -> std::result::Result<Layout, String> {
    Layout::from_name(name)
        .ok_or_else(|| format!("unknown layout '{name}' (expected layered or fixed-offset)"))
}

/// Config file names searched in the working directory
pub const LOCAL_CONFIG_FILES: [&str; 2] = ["nekofilter.toml", "config.toml"];

/// Per-user configuration file, if the platform has a config directory
pub fn user_config_file() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "neko", "nekofilter")
        .map(|dirs| dirs.config_dir().join("nekofilter.toml"))
}

/// First existing config file on the search path
pub fn find_config_file() -> Option<PathBuf> {
    LOCAL_CONFIG_FILES
        .iter()
        .map(PathBuf::from)
        .chain(user_config_file())
        .find(|path| path.exists())
}
