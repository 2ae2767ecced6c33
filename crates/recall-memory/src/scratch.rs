//! Scratch Cache.
//!
//! A bounded first-in-first-out buffer of short text notes.  Nothing here is
//! persisted; the buffer lives for the lifetime of the process.
//!
//! # Example
//!
//! ```rust
//! use recall_memory::scratch::ScratchCache;
//!
//! let mut cache = ScratchCache::new(2);
//! cache.add("first").unwrap();
//! cache.add("second").unwrap();
//! cache.add("third").unwrap(); // evicts "first"
//!
//! let texts: Vec<_> = cache.get_all().into_iter().map(|e| e.text).collect();
//! assert_eq!(texts, vec!["third", "second"]);
//! ```

use std::collections::VecDeque;

use chrono::Utc;
use recall_types::{RecallError, ScratchEntry};
use tracing::debug;

/// Capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 100;

/// Bounded FIFO of [`ScratchEntry`] values, oldest at the front.
pub struct ScratchCache {
    capacity: usize,
    entries: VecDeque<ScratchEntry>,
}

impl Default for ScratchCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ScratchCache {
    /// Create an empty cache.  A `capacity` of zero is raised to one.
    ///
    /// Storage grows on demand; only up to [`DEFAULT_CAPACITY`] slots are
    /// reserved up front.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
        }
    }

    /// Append `text` (trimmed), evicting the oldest entry when over capacity.
    pub fn add(&mut self, text: &str) -> Result<(), RecallError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RecallError::Validation(
                "scratch text must not be empty".to_string(),
            ));
        }
        self.entries.push_back(ScratchEntry {
            text: text.to_string(),
            timestamp: Utc::now(),
        });
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
            debug!(capacity = self.capacity, "scratch cache evicted oldest entry");
        }
        Ok(())
    }

    /// Return a copy of every entry, newest first.
    pub fn get_all(&self) -> Vec<ScratchEntry> {
        self.entries.iter().rev().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Change the capacity, evicting the oldest entries that no longer fit.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<(), RecallError> {
        if capacity < 1 {
            return Err(RecallError::Validation(
                "scratch capacity must be at least 1".to_string(),
            ));
        }
        self.capacity = capacity;
        while self.entries.len() > capacity {
            self.entries.pop_front();
        }
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
