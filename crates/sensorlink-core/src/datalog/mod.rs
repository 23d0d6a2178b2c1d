//! Data Logging
//!
//! Keeps a short in-memory window of recent readings for late-joining
//! dashboards. Nothing is written to disk.

mod recorder;

pub use recorder::{record_from, ReadingLog, DEFAULT_LOG_CAPACITY};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::reading::Reading;

/// A single log entry: a reading and when it was merged
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Wall-clock time the reading was recorded
    pub timestamp: DateTime<Utc>,
    /// The merged reading
    #[serde(flatten)]
    pub reading: Reading,
}

impl LogEntry {
    /// Create a new log entry
    pub fn new(timestamp: DateTime<Utc>, reading: Reading) -> Self {
        Self { timestamp, reading }
    }
}
