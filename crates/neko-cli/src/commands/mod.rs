//! CLI commands

pub mod completions;
pub mod config;
pub mod inspect;
pub mod logs;
pub mod rules;
pub mod run;

use clap::Subcommand;

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a filtering session (main command)
    Run(run::RunArgs),

    /// Block rule management
    Rules(rules::RulesArgs),

    /// Decision history
    Logs(logs::LogsArgs),

    /// Decode a packet and show what the filter would do with it
    Inspect(inspect::InspectArgs),

    /// Configuration management
    Config(config::ConfigArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}
