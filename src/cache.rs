//! Bounded result cache keyed by matched link text.
//!
//! Eviction is by insertion order: once full, inserting a new key drops the
//! oldest inserted key. Reads never reorder entries.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;

use crate::model::ParseResult;

/// Thread-safe FIFO-bounded cache of resolved posts.
#[derive(Debug)]
pub struct ResultCache {
    capacity: usize,
    entries: Mutex<IndexMap<String, Arc<ParseResult>>>,
}

impl ResultCache {
    /// Create a cache holding at most `capacity` entries. `0` disables it.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(IndexMap::with_capacity(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<String, Arc<ParseResult>>> {
        // Every mutation is a single IndexMap call, so a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<Arc<ParseResult>> {
        self.lock().get(key).cloned()
    }

    /// Insert `value` under `key`.
    ///
    /// An existing key keeps its position and gets the new value.
    pub fn put(&self, key: impl Into<String>, value: Arc<ParseResult>) {
        if self.capacity == 0 {
            return;
        }

        let key = key.into();
        let mut entries = self.lock();
        if !entries.contains_key(&key) {
            while entries.len() >= self.capacity {
                if let Some((oldest, _)) = entries.shift_remove_index(0) {
                    tracing::debug!(key = %oldest, "evicted cached result");
                }
            }
        }
        entries.insert(key, value);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_CACHE_CAPACITY)
    }
}
