//! Per-packet filtering
//!
//! Extract → match → (spoof | pass). Every input packet produces exactly one
//! output packet. Anything that does not decode as a DNS query is passed
//! through untouched.

use crate::dns::{DomainExtractor, ExtractError, Layout};
use crate::matcher::RuleMatcher;
use crate::response::spoof_packet;
use crate::rules::DomainRule;
use bytes::Bytes;
use tracing::{debug, trace};

/// Statistics for filter execution
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Total packets processed
    pub packets_processed: u64,
    /// Packets forwarded because they were not DNS queries
    pub passed_through: u64,
    /// Queries forwarded to the resolver
    pub queries_allowed: u64,
    /// Queries answered with a spoofed response
    pub queries_blocked: u64,
}

/// Outcome for one packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Not recognised as a DNS query; forwarded unmodified
    NotDns(ExtractError),
    /// Query forwarded unmodified
    Allowed {
        /// Queried domain
        domain: String,
    },
    /// Query answered in place
    Blocked {
        /// Queried domain
        domain: String,
        /// Pattern of the rule that matched
        pattern: String,
    },
}

impl Verdict {
    /// Domain and blocked flag for queries, `None` for non-DNS packets
    pub fn decision(&self) -> Option<(&str, bool)> {
        match self {
            Verdict::NotDns(_) => None,
            Verdict::Allowed { domain } => Some((domain, false)),
            Verdict::Blocked { domain, .. } => Some((domain, true)),
        }
    }

    /// Check if the query was blocked
    pub fn is_blocked(&self) -> bool {
        matches!(self, Verdict::Blocked { .. })
    }
}

/// A processed packet and what happened to it
#[derive(Debug, Clone)]
pub struct Processed {
    /// Decision taken
    pub verdict: Verdict,
    /// Packet to write back (original or spoofed response)
    pub packet: Bytes,
}

/// DNS filter for a session
///
/// Holds the rules loaded at session start; they are not reloaded.
#[derive(Debug, Clone)]
pub struct DnsFilter {
    extractor: DomainExtractor,
    matcher: RuleMatcher,
    stats: Stats,
}

impl DnsFilter {
    /// Create a filter from a rule set
    pub fn new(rules: &[DomainRule], layout: Layout, dns_port: u16) -> Self {
        Self {
            extractor: DomainExtractor::new(layout, dns_port),
            matcher: RuleMatcher::new(rules),
            stats: Stats::default(),
        }
    }

    /// Number of active block patterns
    pub fn active_patterns(&self) -> usize {
        self.matcher.len()
    }

    /// Packet layout in use
    pub fn layout(&self) -> Layout {
        self.extractor.layout()
    }

    /// Process a single packet
    pub fn process(&mut self, packet: Bytes) -> Processed {
        self.stats.packets_processed += 1;

        let query = match self.extractor.locate(&packet) {
            Ok(query) => query,
            Err(reason) => {
                trace!(%reason, len = packet.len(), "Passing through non-DNS packet");
                return self.pass_through(packet, reason);
            }
        };

        let Some(pattern) = self.matcher.matching_pattern(&query.domain) else {
            self.stats.queries_allowed += 1;
            debug!(domain = %query.domain, "Allowed DNS query");
            return Processed {
                verdict: Verdict::Allowed {
                    domain: query.domain,
                },
                packet,
            };
        };
        let pattern = pattern.to_string();

        match spoof_packet(&packet, self.layout(), query.message_offset) {
            Ok(response) => {
                self.stats.queries_blocked += 1;
                debug!(domain = %query.domain, %pattern, "Blocked DNS query");
                Processed {
                    verdict: Verdict::Blocked {
                        domain: query.domain,
                        pattern,
                    },
                    packet: response,
                }
            }
            Err(e) => self.pass_through(packet, e.into()),
        }
    }

    fn pass_through(&mut self, packet: Bytes, reason: ExtractError) -> Processed {
        self.stats.passed_through += 1;
        Processed {
            verdict: Verdict::NotDns(reason),
            packet,
        }
    }

    /// Get current statistics
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Reset statistics
    pub fn reset_stats(&mut self) {
        self.stats = Stats::default();
    }
}
