//! Reading store
//!
//! Holds the single current reading. Cloning the store clones the handle,
//! not the value: every clone observes the same reading.

use std::sync::{Arc, PoisonError, RwLock};

use super::{Fragment, Reading};

/// Shared "latest reading" state
#[derive(Debug, Clone, Default)]
pub struct ReadingStore {
    current: Arc<RwLock<Reading>>,
}

impl ReadingStore {
    /// Create a store holding the all-zero reading
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a fragment and return the resulting snapshot.
    ///
    /// The snapshot is taken under the write lock, so concurrent merges are
    /// observed in the order they were applied.
    pub fn merge(&self, fragment: &Fragment) -> Reading {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        current.apply(fragment);
        *current
    }

    /// Copy of the current reading
    pub fn snapshot(&self) -> Reading {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }
}
