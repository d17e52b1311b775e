//! Inspect command - run one packet through the filter offline

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use neko_core::packet::Packet;
use neko_core::{Config, DnsFilter, Layout, RuleStore, Verdict};
use std::path::PathBuf;

use crate::args::parse_layout;

/// Inspect command arguments
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Packet bytes as hex (whitespace and ':' separators are ignored)
    pub packet: String,

    /// Packet layout: layered or fixed-offset (default: from config)
    #[arg(long, value_parser = parse_layout)]
    pub layout: Option<Layout>,

    /// DNS port for the layered layout (default: from config)
    #[arg(long)]
    pub dns_port: Option<u16>,

    /// Rules file (default: from config)
    #[arg(short, long)]
    pub rules: Option<PathBuf>,
}

/// Decode hex, ignoring whitespace and ':' separators
fn decode_packet(text: &str) -> std::result::Result<Vec<u8>, hex::FromHexError> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(cleaned)
}

/// Execute inspect command
pub fn execute(args: InspectArgs, config: &Config) -> Result<()> {
    let data = decode_packet(&args.packet).context("Packet is not valid hex")?;
    let layout = args.layout.unwrap_or(config.filter.layout);
    let dns_port = args.dns_port.unwrap_or(config.filter.dns_port);
    let rules = RuleStore::load(args.rules.unwrap_or_else(|| config.storage.rules_path()));

    println!("Packet: {} bytes, layout {:?}", data.len(), layout);

    if layout == Layout::Layered {
        match Packet::from_bytes(&data) {
            Ok(packet) => println!(
                "  {:?} {:?} {}:{} -> {}:{}{}",
                packet.ip_version,
                packet.protocol,
                packet.src_addr,
                packet.src_port,
                packet.dst_addr,
                packet.dst_port,
                if packet.is_fragment() { " (fragment)" } else { "" }
            ),
            Err(e) => println!("  {}", format!("Undecodable: {e}").yellow()),
        }
    }

    let mut filter = DnsFilter::new(rules.rules(), layout, dns_port);
    let processed = filter.process(data.into());

    match &processed.verdict {
        Verdict::NotDns(reason) => {
            println!("  {} {}", "NOT A DNS QUERY".yellow().bold(), reason);
            println!("  Forwarded unmodified");
        }
        Verdict::Allowed { domain } => {
            println!("  Domain: {}", domain.cyan());
            println!("  {}", "ALLOWED".green().bold());
        }
        Verdict::Blocked { domain, pattern } => {
            println!("  Domain: {}", domain.cyan());
            println!("  {} (matches '{}')", "BLOCKED".red().bold(), pattern);
            println!("  Response: {}", hex::encode(&processed.packet));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_with_separators() {
        assert_eq!(decode_packet("45 00:1f\n").unwrap(), vec![0x45, 0x00, 0x1f]);
        assert!(decode_packet("4").is_err());
    }
}
