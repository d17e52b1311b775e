//! Shell completion scripts

use anyhow::{Context, Result};
use clap::{Args, CommandFactory};
use clap_complete::{generate, Shell};
use std::io::Write;
use std::path::PathBuf;

use crate::args::Args as CliArgs;

const BIN_NAME: &str = "nekofilter";

/// Completions command arguments
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,

    /// Write the script to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Execute completions command
pub fn execute(args: CompletionsArgs) -> Result<()> {
    let mut cmd = CliArgs::command();

    match args.output {
        Some(path) => {
            let mut script = Vec::new();
            generate(args.shell, &mut cmd, BIN_NAME, &mut script);
            std::fs::File::create(&path)
                .and_then(|mut file| file.write_all(&script))
                .with_context(|| format!("Failed to write completions to {}", path.display()))?;
            println!("{} completions written to {}", args.shell, path.display());
        }
        None => generate(args.shell, &mut cmd, BIN_NAME, &mut std::io::stdout()),
    }

    Ok(())
}
