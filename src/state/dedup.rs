//! Per-stage deduplication index

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// A set of identity keys shared by the workers of one pipeline stage
///
/// Each stage owns its own index; the discovery, scrape and persist stages
/// never share one. All operations take the index's single lock, so
/// `insert` is an atomic check-and-mark.
#[derive(Debug, Default)]
pub struct DeduplicationIndex {
    seen: Mutex<HashSet<String>>,
}

impl DeduplicationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index that already contains `keys`
    pub fn with_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            seen: Mutex::new(keys.into_iter().map(Into::into).collect()),
        }
    }

    /// Marks `key` as seen. Returns `true` if it was not seen before.
    pub fn insert(&self, key: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        if seen.contains(key) {
            false
        } else {
            seen.insert(key.to_string())
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
