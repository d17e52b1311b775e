//! Bounded history of filtering decisions
//!
//! Most recent entry first. The whole list is rewritten after every append;
//! the log viewer reads the same file.
//!
//! Timestamps are stored the way the control app's JSON encoder writes
//! dates: fractional seconds since 2001-01-01T00:00:00Z.

use crate::store::{self, StoreError};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Default number of entries kept
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// One filtering decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsLogEntry {
    /// Unique identifier
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// When the query was seen
    #[serde(with = "reference_seconds")]
    pub timestamp: DateTime<Utc>,
    /// Queried domain
    pub domain: String,
    /// Whether the query was answered with a spoofed response
    pub blocked: bool,
}

impl DnsLogEntry {
    /// Create an entry stamped with the current time
    pub fn new(domain: impl Into<String>, blocked: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now().trunc_subsecs(6),
            domain: domain.into(),
            blocked,
        }
    }
}

/// Serde adapter for seconds since the 2001 reference date
///
/// Written as a JSON number with microsecond resolution. RFC 3339 strings
/// are still accepted on read.
pub mod reference_seconds {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// 2001-01-01T00:00:00Z as a Unix timestamp
    pub const REFERENCE_UNIX_SECONDS: i64 = 978_307_200;

    /// Seconds between the reference date and `timestamp`
    #[allow(clippy::cast_precision_loss)]
    pub fn to_seconds(timestamp: &DateTime<Utc>) -> f64 {
        let whole = timestamp.timestamp() - REFERENCE_UNIX_SECONDS;
        whole as f64 + f64::from(timestamp.timestamp_subsec_micros()) / 1e6
    }

    /// Instant `seconds` after the reference date, if representable
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn from_seconds(seconds: f64) -> Option<DateTime<Utc>> {
        if !seconds.is_finite() || seconds.abs() >= i64::MAX as f64 {
            return None;
        }
        let whole = seconds.floor();
        let micros = (((seconds - whole) * 1e6).round() as u32).min(999_999);
        let unix = (whole as i64).checked_add(REFERENCE_UNIX_SECONDS)?;
        DateTime::from_timestamp(unix, micros * 1_000)
    }

    /// Serialize as reference-date seconds
    pub fn serialize<S: Serializer>(
        timestamp: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(to_seconds(timestamp))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stored {
        Seconds(f64),
        Text(String),
    }

    /// Deserialize from reference-date seconds or an RFC 3339 string
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        match Stored::deserialize(deserializer)? {
            Stored::Seconds(seconds) => from_seconds(seconds)
                .ok_or_else(|| de::Error::custom(format!("timestamp {seconds} out of range"))),
            Stored::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(de::Error::custom),
        }
    }
}

/// Decision history backed by a JSON file
#[derive(Debug, Clone)]
pub struct LogStore {
    path: PathBuf,
    entries: VecDeque<DnsLogEntry>,
    capacity: usize,
}

impl LogStore {
    /// Create an empty history for `path`
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY) + 1),
            capacity: capacity.max(1),
        }
    }

    /// Create the history used by a tunnel session
    ///
    /// With `resume` the existing file seeds the history, so entries from
    /// earlier sessions survive the first write. Without it the file is
    /// never read and is overwritten by the first append.
    pub fn open(path: impl Into<PathBuf>, capacity: usize, resume: bool) -> Self {
        let mut history = Self::new(path, capacity);
        if resume {
            match Self::read(&history.path) {
                Ok(entries) => {
                    history.entries = entries.into_iter().take(history.capacity).collect();
                    debug!(count = history.entries.len(), "Resumed decision history");
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(error = %e, "Discarding unreadable decision history"),
            }
        }
        history
    }

    /// Read the persisted history, reporting why it could not be read
    pub fn read(path: &Path) -> Result<Vec<DnsLogEntry>, StoreError> {
        store::read_json(path)
    }

    /// Load the persisted history for display, degrading to empty
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::read(&path) {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load decision history");
                Vec::new()
            }
        };
        let capacity = entries.len().max(DEFAULT_LOG_CAPACITY);
        Self {
            path,
            entries: entries.into(),
            capacity,
        }
    }

    /// Insert at the head, evicting the oldest entry past capacity
    pub fn append(&mut self, entry: DnsLogEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    /// Atomically replace the history file with the current entries
    pub fn persist(&self) -> Result<(), StoreError> {
        store::write_json_atomic(&self.path, &self.entries)
    }

    /// Append a decision and persist the history
    pub fn record(&mut self, domain: impl Into<String>, blocked: bool) -> Result<(), StoreError> {
        self.append(DnsLogEntry::new(domain, blocked));
        self.persist()
    }

    /// Remove all entries (not persisted until [`persist`](Self::persist))
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries, most recent first
    pub fn entries(&self) -> impl Iterator<Item = &DnsLogEntry> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the history is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries kept
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
