//! Query service
//!
//! Pull-side access to the current reading and the recent reading log.

use crate::datalog::{LogEntry, ReadingLog};
use crate::reading::{Reading, ReadingStore};

/// Read-only view used by the HTTP endpoints
#[derive(Debug, Clone)]
pub struct QueryService {
    store: ReadingStore,
    log: ReadingLog,
}

impl QueryService {
    /// Query over `store` and `log`
    pub fn new(store: ReadingStore, log: ReadingLog) -> Self {
        Self { store, log }
    }

    /// Current reading
    pub fn current(&self) -> Reading {
        self.store.snapshot()
    }

    /// Recent readings, oldest first
    pub fn history(&self) -> Vec<LogEntry> {
        self.log.entries()
    }
}
