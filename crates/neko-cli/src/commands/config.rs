//! Config command - configuration management

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use neko_core::Config;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::args::{find_config_file, user_config_file, ConfigSource, LOCAL_CONFIG_FILES};

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Generate a configuration file with default values
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "nekofilter.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Config file to validate
        file: PathBuf,
    },

    /// Show config and data file locations
    Paths,
}

/// Execute config command
pub fn execute(args: ConfigArgs, source: &ConfigSource) -> Result<()> {
    match args.action {
        ConfigAction::Show => show_config(source),
        ConfigAction::Generate { output, force } => generate_config(&output, force),
        ConfigAction::Validate { file } => validate_config(&file),
        ConfigAction::Paths => show_paths(source),
    }
}

fn show_config(source: &ConfigSource) -> Result<()> {
    let config = source.load()?;
    let toml_str = config.to_toml().context("Failed to serialize config")?;
    println!("{toml_str}");
    Ok(())
}

fn generate_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    let toml_str = Config::default()
        .to_toml()
        .context("Failed to serialize config")?;

    // Add header comment
    let content = format!(
        "# NekoFilter configuration\n\
         # storage.dir defaults to the platform data directory\n\
         # filter.layout: \"layered\" (IP/UDP/DNS) or \"fixed-offset\" (bare DNS)\n\n\
         {toml_str}"
    );

    std::fs::write(output, content)
        .with_context(|| format!("Failed to write config to {}", output.display()))?;

    info!(path = %output.display(), "Generated config file");
    println!("Configuration file generated: {}", output.display());

    Ok(())
}

fn validate_config(file: &Path) -> Result<()> {
    let config = Config::load(file)
        .with_context(|| format!("Failed to load config from {}", file.display()))?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{} Configuration is valid", "✓".green());
    println!("  Remote address: {}", config.tunnel.remote_address);
    println!("  DNS servers: {}", config.tunnel.dns_servers.join(", "));
    println!("  Layout: {:?}", config.filter.layout);
    println!("  Rules file: {}", config.storage.rules_path().display());
    println!("  Logs file: {} (keeps {})", config.storage.logs_path().display(), config.storage.log_capacity);

    Ok(())
}

fn show_paths(source: &ConfigSource) -> Result<()> {
    println!("Configuration file search paths:");
    println!();

    let mut index = 1;
    for name in LOCAL_CONFIG_FILES {
        println!("  {index}. ./{name}");
        index += 1;
    }
    if let Some(path) = user_config_file() {
        println!("  {index}. {}", path.display());
    }

    println!();
    match source.config.clone().or_else(find_config_file) {
        Some(path) => println!("Active config: {}", path.display().to_string().cyan()),
        None => println!("Active config: {}", "(built-in defaults)".dimmed()),
    }

    let config = source.load()?;
    println!();
    println!("Data files:");
    println!("  Rules: {}", config.storage.rules_path().display());
    println!("  Logs:  {}", config.storage.logs_path().display());

    Ok(())
}
