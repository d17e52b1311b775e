//! Block rule evaluation
//!
//! A domain is blocked when any active block rule's pattern occurs anywhere
//! in it, compared case-insensitively. There is no anchoring and no wildcard
//! syntax: `"ads."` matches both `ads.example.com` and `myads.net`.
//!
//! Patterns are compared exactly as stored, surrounding whitespace included.
//! The empty pattern never matches. Allow rules (`is_blocked == false`) are
//! stored and toggleable but are not consulted here.

use crate::rules::DomainRule;

/// Check whether `domain` is blocked by any rule in `rules`
pub fn should_block(domain: &str, rules: &[DomainRule]) -> bool {
    let domain = domain.to_lowercase();
    rules
        .iter()
        .filter(|rule| rule.blocks())
        .filter_map(|rule| normalize(&rule.pattern))
        .any(|pattern| domain.contains(&pattern))
}

/// Lowercased pattern, or `None` when it would match every domain
fn normalize(pattern: &str) -> Option<String> {
    if pattern.is_empty() {
        None
    } else {
        Some(pattern.to_lowercase())
    }
}

/// Rule matcher prepared once per session
///
/// Keeps only the active block patterns, already lowercased, so the packet
/// path does a single pass of substring checks.
#[derive(Debug, Clone, Default)]
pub struct RuleMatcher {
    patterns: Vec<String>,
}

impl RuleMatcher {
    /// Prepare a matcher from a rule set
    pub fn new(rules: &[DomainRule]) -> Self {
        let patterns = rules
            .iter()
            .filter(|rule| rule.blocks())
            .filter_map(|rule| normalize(&rule.pattern))
            .collect();
        Self { patterns }
    }

    /// Number of patterns that can block
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Check if nothing can be blocked
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Return the first pattern that blocks `domain`
    pub fn matching_pattern(&self, domain: &str) -> Option<&str> {
        let domain = domain.to_lowercase();
        self.patterns
            .iter()
            .find(|pattern| domain.contains(pattern.as_str()))
            .map(String::as_str)
    }

    /// Check whether `domain` is blocked
    pub fn should_block(&self, domain: &str) -> bool {
        self.matching_pattern(domain).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, blocked: bool, active: bool) -> DomainRule {
        let mut rule = DomainRule::new(pattern, blocked);
        rule.is_active = active;
        rule
    }

    #[test]
    fn test_substring_match() {
        let rules = vec![rule("ads.", true, true)];

        assert!(should_block("static.ads.example.com", &rules));
        assert!(should_block("myads.net", &rules));
        assert!(!should_block("example.com", &rules));
    }

    #[test]
    fn test_unanchored_match() {
        let rules = vec![rule("ads", true, true)];
        assert!(should_block("myads.net", &rules));
        assert!(should_block("ads.example.com", &rules));
    }

    #[test]
    fn test_case_insensitive() {
        let rules = vec![rule("Tracker", true, true)];
        assert!(should_block("cdn.TRACKER.io", &rules));
        assert!(should_block("cdn.tracker.io", &rules));
    }

    #[test]
    fn test_inactive_and_allow_rules_ignored() {
        let rules = vec![rule("ads", true, false), rule("ads", false, true)];
        assert!(!should_block("ads.example.com", &rules));
    }

    #[test]
    fn test_empty_pattern_never_matches() {
        let rules = vec![rule("", true, true)];
        assert!(!should_block("example.com", &rules));
        assert!(RuleMatcher::new(&rules).is_empty());
    }

    #[test]
    fn test_whitespace_is_part_of_pattern() {
        let rules = vec![rule(" ads.", true, true), rule("   ", true, true)];
        assert!(!should_block("myads.net", &rules));
        assert!(!should_block("static.ads.example.com", &rules));

        let matcher = RuleMatcher::new(&rules);
        assert_eq!(matcher.len(), 2);
        assert_eq!(matcher.matching_pattern("odd ads.name"), Some(" ads."));
    }

    #[test]
    fn test_matcher_reports_pattern() {
        let rules = vec![
            rule("allowed", false, true),
            rule("Doubleclick", true, true),
        ];
        let matcher = RuleMatcher::new(&rules);
        assert_eq!(matcher.len(), 1);
        assert_eq!(
            matcher.matching_pattern("ad.doubleclick.net"),
            Some("doubleclick")
        );
        assert!(!matcher.should_block("allowed.example"));
    }
}
