//! Rule management commands
//!
//! Edits the rules file shared with the tunnel. A running session keeps the
//! rules it loaded at start; changes apply to the next session.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use neko_core::{Config, DomainRule, RuleMatcher, RuleStore};
use std::path::PathBuf;
use uuid::Uuid;

/// Rule management arguments
#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Rules file (default: from config)
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub action: RulesAction,
}

/// Rule subcommands
#[derive(Subcommand, Debug)]
pub enum RulesAction {
    /// List all rules
    List,

    /// Add a rule
    Add {
        /// Substring matched case-insensitively against queried domains
        pattern: String,

        /// Store as an allow rule (kept, but never blocks)
        #[arg(long)]
        allow: bool,

        /// Add the rule disabled
        #[arg(long)]
        inactive: bool,
    },

    /// Remove a rule by id (a unique prefix is enough)
    Remove {
        /// Rule id or id prefix
        id: String,
    },

    /// Enable or disable a rule
    Toggle {
        /// Rule id or id prefix
        id: String,
    },

    /// Check whether a domain would be blocked
    Check {
        /// Domain to check
        domain: String,
    },
}

/// Execute rules command
pub fn execute(args: RulesArgs, config: &Config) -> Result<()> {
    let path = args.file.unwrap_or_else(|| config.storage.rules_path());

    match args.action {
        RulesAction::List => list_rules(path),
        RulesAction::Add {
            pattern,
            allow,
            inactive,
        } => add_rule(path, pattern, !allow, !inactive),
        RulesAction::Remove { id } => remove_rule(path, &id),
        RulesAction::Toggle { id } => toggle_rule(path, &id),
        RulesAction::Check { domain } => check_domain(path, &domain),
    }
}

/// Strict load: a management command must not overwrite an unreadable file
fn open_store(path: PathBuf) -> Result<RuleStore> {
    match RuleStore::read(&path) {
        Ok(rules) => Ok(RuleStore::with_rules(path, rules)),
        Err(e) if e.is_not_found() => Ok(RuleStore::new(path)),
        Err(e) => Err(e).context("Failed to read rules file"),
    }
}

fn resolve(store: &RuleStore, prefix: &str) -> Result<Uuid> {
    store.resolve(prefix).with_context(|| {
        format!("No single rule matches id '{prefix}' (run `nekofilter rules list`)")
    })
}

fn describe(rule: &DomainRule) -> String {
    let kind = if rule.is_blocked {
        "block".red()
    } else {
        "allow".green()
    };
    let state = if rule.is_active {
        "active".normal()
    } else {
        "inactive".dimmed()
    };
    format!("{}  {:<5}  {:<8}  {}", rule.id, kind, state, rule.pattern)
}

fn list_rules(path: PathBuf) -> Result<()> {
    let store = open_store(path)?;

    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", " Filter Rules".bright_white().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!("File: {}", store.path().display().to_string().cyan());
    println!(
        "Total: {}  (blocking: {})",
        store.len().to_string().green(),
        RuleMatcher::new(store.rules()).len()
    );
    println!("{}", "─".repeat(70).bright_black());

    if store.is_empty() {
        println!("{}", "  (no rules)".dimmed());
    } else {
        for rule in store.rules() {
            println!("  {}", describe(rule));
        }
    }

    println!("{}", "═".repeat(70).bright_blue());
    Ok(())
}

fn add_rule(path: PathBuf, pattern: String, is_blocked: bool, is_active: bool) -> Result<()> {
    if pattern.trim().is_empty() {
        anyhow::bail!("Pattern must not be empty");
    }

    let mut store = open_store(path)?;
    let id = store.add(pattern.trim(), is_blocked);
    if !is_active {
        store.toggle(id);
    }
    store.save().context("Failed to save rules")?;

    println!("{} Added rule {}", "✓".green(), id.to_string().cyan());
    Ok(())
}

fn remove_rule(path: PathBuf, prefix: &str) -> Result<()> {
    let mut store = open_store(path)?;
    let id = resolve(&store, prefix)?;
    let removed = store
        .remove(id)
        .with_context(|| format!("Rule {id} disappeared"))?;
    store.save().context("Failed to save rules")?;

    println!("{} Removed rule '{}'", "✓".green(), removed.pattern);
    Ok(())
}

fn toggle_rule(path: PathBuf, prefix: &str) -> Result<()> {
    let mut store = open_store(path)?;
    let id = resolve(&store, prefix)?;
    let active = store
        .toggle(id)
        .with_context(|| format!("Rule {id} disappeared"))?;
    store.save().context("Failed to save rules")?;

    let state = if active { "enabled" } else { "disabled" };
    println!("{} Rule {} {}", "✓".green(), id.to_string().cyan(), state);
    Ok(())
}

fn check_domain(path: PathBuf, domain: &str) -> Result<()> {
    let store = open_store(path)?;
    let matcher = RuleMatcher::new(store.rules());

    match matcher.matching_pattern(domain) {
        Some(pattern) => println!(
            "{} {} (matches '{}')",
            "BLOCKED".red().bold(),
            domain,
            pattern
        ),
        None => println!("{} {}", "ALLOWED".green().bold(), domain),
    }
    Ok(())
}
