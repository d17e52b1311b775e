//! # NekoFilter Core
//!
//! Platform-independent core library for the local DNS content filter.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **Packet decoding** - IPv4/IPv6 and UDP header decoding, checksums
//! - **Domain extraction** - question name from a raw DNS query
//! - **Rule matching** - substring block rules over the extracted domain
//! - **Response synthesis** - spoofed "no answer" replies for blocked queries
//! - **Persistence** - rule set and bounded decision history as JSON files
//! - **Configuration** - TOML configuration with sensible defaults
//!
//! ## Example
//!
//! ```rust,no_run
//! use neko_core::{Config, DnsFilter, LogStore, RuleStore};
//!
//! let config = Config::load("nekofilter.toml")?;
//! let rules = RuleStore::load(config.storage.rules_path());
//! let mut history = LogStore::open(
//!     config.storage.logs_path(),
//!     config.storage.log_capacity,
//!     config.storage.resume_history,
//! );
//! # let packet = bytes::Bytes::new();
//! let mut filter = DnsFilter::new(rules.rules(), config.filter.layout, config.filter.dns_port);
//!
//! let processed = filter.process(packet);
//! if let Some((domain, blocked)) = processed.verdict.decision() {
//!     let _ = history.record(domain, blocked);
//! }
//! # Ok::<(), neko_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod dns;
pub mod error;
pub mod filter;
pub mod history;
pub mod matcher;
pub mod packet;
pub mod response;
pub mod rules;
pub mod store;

// Re-exports for convenience
pub use config::Config;
pub use dns::{DomainExtractor, ExtractError, Layout};
pub use error::{Error, Result};
pub use filter::{DnsFilter, Processed, Stats, Verdict};
pub use history::{DnsLogEntry, LogStore, DEFAULT_LOG_CAPACITY};
pub use matcher::{should_block, RuleMatcher};
pub use response::{spoof_packet, synthesize};
pub use rules::{DomainRule, RuleStore};
pub use store::StoreError;
