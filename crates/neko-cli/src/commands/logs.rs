//! Decision history commands

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use neko_core::{Config, LogStore};
use std::path::PathBuf;

/// Log command arguments
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// History file (default: from config)
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub action: LogsAction,
}

/// Log subcommands
#[derive(Subcommand, Debug)]
pub enum LogsAction {
    /// Show recent decisions, most recent first
    Show {
        /// Maximum number of entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Only blocked queries
        #[arg(long)]
        blocked: bool,
    },

    /// Delete all entries
    Clear,
}

/// Execute logs command
pub fn execute(args: LogsArgs, config: &Config) -> Result<()> {
    let path = args.file.unwrap_or_else(|| config.storage.logs_path());

    match args.action {
        LogsAction::Show { limit, blocked } => show_logs(path, limit, blocked),
        LogsAction::Clear => clear_logs(path),
    }
}

fn show_logs(path: PathBuf, limit: Option<usize>, blocked_only: bool) -> Result<()> {
    let history = LogStore::load(path);

    let entries: Vec<_> = history
        .entries()
        .filter(|e| !blocked_only || e.blocked)
        .take(limit.unwrap_or(usize::MAX))
        .collect();

    if entries.is_empty() {
        println!("{}", "No DNS decisions recorded".dimmed());
        return Ok(());
    }

    for entry in &entries {
        let verdict = if entry.blocked {
            "BLOCK".red().bold()
        } else {
            "ALLOW".green()
        };
        println!(
            "{}  {}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            verdict,
            entry.domain
        );
    }

    let blocked = history.entries().filter(|e| e.blocked).count();
    println!(
        "{}",
        format!(
            "{} shown, {} recorded, {} blocked",
            entries.len(),
            history.len(),
            blocked
        )
        .dimmed()
    );
    Ok(())
}

fn clear_logs(path: PathBuf) -> Result<()> {
    let mut history = LogStore::load(path);
    let count = history.len();
    history.clear();
    history.persist().context("Failed to clear decision history")?;

    println!("{} Cleared {} entries", "✓".green(), count);
    Ok(())
}
