//! Filter rules and their persisted collection
//!
//! The rules file is a JSON array of [`DomainRule`] objects shared with the
//! control-plane app. The tunnel loads it once at session start and never
//! writes it.

use crate::store::{self, StoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A block or allow rule matched against queried domains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRule {
    /// Unique identifier (generated when absent from the file)
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Substring matched case-insensitively against the domain
    pub pattern: String,
    /// `true` for block rules, `false` for allow rules
    pub is_blocked: bool,
    /// Inactive rules are kept but never match
    pub is_active: bool,
}

impl DomainRule {
    /// Create an active rule
    pub fn new(pattern: impl Into<String>, is_blocked: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            pattern: pattern.into(),
            is_blocked,
            is_active: true,
        }
    }

    /// Create an active block rule
    pub fn block(pattern: impl Into<String>) -> Self {
        Self::new(pattern, true)
    }

    /// Create an active allow rule
    pub fn allow(pattern: impl Into<String>) -> Self {
        Self::new(pattern, false)
    }

    /// Check if this rule takes part in blocking
    pub fn blocks(&self) -> bool {
        self.is_active && self.is_blocked
    }
}

/// Owned rule collection backed by a JSON file
#[derive(Debug, Clone)]
pub struct RuleStore {
    path: PathBuf,
    rules: Vec<DomainRule>,
}

impl RuleStore {
    /// Create an empty store for `path` without touching the file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rules: Vec::new(),
        }
    }

    /// Create a store holding `rules`
    pub fn with_rules(path: impl Into<PathBuf>, rules: Vec<DomainRule>) -> Self {
        Self {
            path: path.into(),
            rules,
        }
    }

    /// Read the persisted rules, reporting why they could not be read
    pub fn read(path: &Path) -> Result<Vec<DomainRule>, StoreError> {
        store::read_json(path)
    }

    /// Load the persisted rules, degrading to an empty set
    ///
    /// An empty set means nothing is blocked.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let rules = match Self::read(&path) {
            Ok(rules) => {
                info!(path = %path.display(), count = rules.len(), "Loaded rules");
                rules
            }
            Err(e) if e.is_not_found() => {
                debug!(path = %path.display(), "No rules file, starting with an empty rule set");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Failed to load rules, filtering disabled");
                Vec::new()
            }
        };
        Self { path, rules }
    }

    /// Atomically replace the rules file with the current rules
    pub fn save(&self) -> Result<(), StoreError> {
        store::write_json_atomic(&self.path, &self.rules)?;
        debug!(path = %self.path.display(), count = self.rules.len(), "Saved rules");
        Ok(())
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rules in insertion order
    pub fn rules(&self) -> &[DomainRule] {
        &self.rules
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if there are no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Append a new active rule and return its id
    pub fn add(&mut self, pattern: impl Into<String>, is_blocked: bool) -> Uuid {
        let rule = DomainRule::new(pattern, is_blocked);
        let id = rule.id;
        self.rules.push(rule);
        id
    }

    /// Remove a rule by id
    pub fn remove(&mut self, id: Uuid) -> Option<DomainRule> {
        let index = self.rules.iter().position(|r| r.id == id)?;
        Some(self.rules.remove(index))
    }

    /// Flip a rule's active flag, returning the new value
    pub fn toggle(&mut self, id: Uuid) -> Option<bool> {
        let rule = self.rules.iter_mut().find(|r| r.id == id)?;
        rule.is_active = !rule.is_active;
        Some(rule.is_active)
    }

    /// Find the id of the single rule whose id starts with `prefix`
    ///
    /// Returns `None` when no rule or more than one rule matches.
    pub fn resolve(&self, prefix: &str) -> Option<Uuid> {
        let prefix = prefix.trim().to_lowercase();
        if prefix.is_empty() {
            return None;
        }

        let mut matches = self
            .rules
            .iter()
            .filter(|r| r.id.to_string().starts_with(&prefix));
        let first = matches.next()?;
        if matches.next().is_some() {
            return None;
        }
        Some(first.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_json_field_names() {
        let rule = DomainRule::block("ads.");
        let json = serde_json::to_value(&rule).unwrap();

        assert_eq!(json["pattern"], "ads.");
        assert_eq!(json["isBlocked"], true);
        assert_eq!(json["isActive"], true);
        assert!(json["id"].is_string());
    }

    #[test]
    fn test_rule_without_id_decodes() {
        let json = r#"[{"pattern":"tracker","isBlocked":true,"isActive":false}]"#;
        let rules: Vec<DomainRule> = serde_json::from_str(json).unwrap();

        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].pattern, "tracker");
        assert!(!rules[0].blocks());
    }

    #[test]
    fn test_uppercase_uuid_decodes() {
        let json = r#"{"id":"E621E1F8-C36C-495A-93FC-0C247A3E6E5F","pattern":"x","isBlocked":false,"isActive":true}"#;
        let rule: DomainRule = serde_json::from_str(json).unwrap();
        assert_eq!(
            rule.id.to_string(),
            "e621e1f8-c36c-495a-93fc-0c247a3e6e5f"
        );
    }

    #[test]
    fn test_add_toggle_remove() {
        let mut store = RuleStore::new("rules.json");
        let id = store.add("ads", true);
        assert_eq!(store.len(), 1);

        assert_eq!(store.toggle(id), Some(false));
        assert_eq!(store.toggle(id), Some(true));

        let removed = store.remove(id).unwrap();
        assert_eq!(removed.pattern, "ads");
        assert!(store.is_empty());
        assert_eq!(store.toggle(id), None);
    }

    #[test]
    fn test_resolve_prefix() {
        let mut store = RuleStore::new("rules.json");
        let id = store.add("ads", true);
        let text = id.to_string();

        assert_eq!(store.resolve(&text[..8]), Some(id));
        assert_eq!(store.resolve(&text.to_uppercase()), Some(id));
        assert_eq!(store.resolve(""), None);
    }
}
