//! NekoFilter CLI
//!
//! Command-line interface for the local DNS content filter.

mod args;
mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;
use neko_core::config::LoggingConfig;
use neko_core::Config;
use tracing::error;

use args::Args;
use commands::Command;

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Configuration also drives logging; a load failure is reported once
    // logging is up, by the commands that need it
    let config = args.source.load();
    let fallback = LoggingConfig::default();
    let logging_config = config.as_ref().map_or(&fallback, |c| &c.logging);

    // Initialize logging
    logging::init(&args, logging_config)?;

    // Run the main logic
    let result = run(args, config);

    if let Err(ref e) = result {
        error!("Fatal error: {:#}", e);
    }

    result
}

fn run(args: Args, config: Result<Config>) -> Result<()> {
    match args.command {
        Command::Run(run_args) => {
            print_banner();
            commands::run::execute(run_args, config?)
        }
        Command::Rules(rules_args) => commands::rules::execute(rules_args, &config?),
        Command::Logs(logs_args) => commands::logs::execute(logs_args, &config?),
        Command::Inspect(inspect_args) => commands::inspect::execute(inspect_args, &config?),
        Command::Config(config_args) => commands::config::execute(config_args, &args.source),
        Command::Completions(comp_args) => commands::completions::execute(comp_args),
    }
}

fn print_banner() {
    use colored::Colorize;

    eprintln!();
    eprintln!("{}", "╔═══════════════════════════════════════════╗".cyan());
    eprintln!(
        "{}{}{}",
        "║  ".cyan(),
        format!("NekoFilter v{:<8}", env!("CARGO_PKG_VERSION")).green().bold(),
        "                       ║".cyan()
    );
    eprintln!(
        "{}{}{}",
        "║  ".cyan(),
        "Local DNS content filter".white(),
        "                 ║".cyan()
    );
    eprintln!("{}", "╚═══════════════════════════════════════════╝".cyan());
    eprintln!();
}
