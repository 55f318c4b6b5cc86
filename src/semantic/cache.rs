//! Query embedding cache.
//!
//! Keyed by the SHA-256 digest of the query text. Entries are idempotent, so
//! a poisoned lock is recovered rather than propagated. Both bounds are
//! optional; without them the cache grows for the lifetime of the engine.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

pub type CacheKey = [u8; 32];

/// Deterministic cache key for a piece of query text.
pub fn cache_key(text: &str) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.finalize().into()
}

struct CachedVector {
    vector: Vec<f32>,
    inserted_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CachedVector>,
    /// Insertion order, oldest first.
    order: VecDeque<CacheKey>,
}

impl CacheState {
    fn remove(&mut self, key: &CacheKey) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }
}

pub struct QueryCache {
    state: Mutex<CacheState>,
    max_entries: Option<usize>,
    ttl: Option<Duration>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl QueryCache {
    pub fn new(max_entries: Option<usize>, ttl: Option<Duration>) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            max_entries,
            ttl,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None, None)
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up the vector for `text`.
    ///
    /// With `dimensions` set, an entry of any other length is evicted and
    /// treated as a miss. Expired entries are evicted the same way.
    pub fn get(&self, text: &str, dimensions: Option<usize>) -> Option<Vec<f32>> {
        let key = cache_key(text);
        let mut state = self.lock();

        let entry = state.entries.get(&key)?;

        let expired = self
            .ttl
            .is_some_and(|ttl| entry.inserted_at.elapsed() > ttl);
        let incompatible = dimensions.is_some_and(|dims| entry.vector.len() != dims);

        if expired || incompatible {
            if incompatible {
                log::debug!(
                    "dropping cached vector of {} dims, index expects {:?}",
                    entry.vector.len(),
                    dimensions
                );
            }
            state.remove(&key);
            return None;
        }

        Some(entry.vector.clone())
    }

    pub fn insert(&self, text: &str, vector: Vec<f32>) {
        let key = cache_key(text);
        let mut state = self.lock();

        if state.entries.contains_key(&key) {
            state.remove(&key);
        }

        state.entries.insert(
            key,
            CachedVector {
                vector,
                inserted_at: Instant::now(),
            },
        );
        state.order.push_back(key);

        if let Some(max) = self.max_entries {
            while state.entries.len() > max {
                match state.order.pop_front() {
                    Some(oldest) => {
                        state.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }
}
