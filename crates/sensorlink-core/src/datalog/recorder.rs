//! Reading log / recorder
//!
//! Bounded FIFO of recent readings, fed from a hub subscription.

use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::LogEntry;
use crate::hub::Subscription;
use crate::reading::Reading;

/// Default window size, matching the dashboard's chart
pub const DEFAULT_LOG_CAPACITY: usize = 50;

/// Shared, bounded reading log
#[derive(Debug, Clone)]
pub struct ReadingLog {
    buffer: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl Default for ReadingLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl ReadingLog {
    /// Create a log keeping at most `capacity` entries. A capacity of zero
    /// records nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    fn buffer(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a reading stamped with the current time
    pub fn record(&self, reading: Reading) {
        self.push(LogEntry::new(Utc::now(), reading));
    }

    /// Append an entry, evicting the oldest once full
    pub fn push(&self, entry: LogEntry) {
        if self.capacity == 0 {
            return;
        }
        let mut buffer = self.buffer();
        while buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(entry);
    }

    /// Copy of all entries, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.buffer().iter().cloned().collect()
    }

    /// Get the number of recorded entries
    pub fn len(&self) -> usize {
        self.buffer().len()
    }

    /// True if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.buffer().is_empty()
    }

    /// Maximum number of entries kept
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear all recorded data
    pub fn clear(&self) {
        self.buffer().clear();
    }
}

/// Feed `log` from a hub subscription until the hub drops it or `shutdown`
/// fires.
///
/// The first snapshot a subscription receives restates the current value
/// rather than reporting a new merge, so it is not recorded.
pub async fn record_from(log: ReadingLog, mut subscription: Subscription, shutdown: CancellationToken) {
    let mut primed = false;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            next = subscription.recv() => match next {
                Some(_) if !primed => primed = true,
                Some(reading) => log.record(reading),
                None => break,
            },
        }
    }
    debug!(entries = log.len(), "reading recorder stopped");
}
