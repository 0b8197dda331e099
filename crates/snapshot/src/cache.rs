//! Bounded LRU cache for lazily fetched detail, with single-flight fetches.
//!
//! Writes move an entry to the most-recent end; the oldest entry is evicted
//! once the cache exceeds its capacity. While a fetch for an id is
//! outstanding, further requests for that id are suppressed.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default number of entries kept.
pub const DEFAULT_CAPACITY: usize = 100;

/// Outcome of [`MetadataCache::get_or_fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome<V, E> {
    /// Served from the cache; no fetch ran
    Cached(V),
    /// Fetched now and stored
    Fetched(V),
    /// Another fetch for this id is outstanding; nothing ran
    InFlight,
    /// The fetch ran and failed; nothing was stored
    Failed(E),
}

#[derive(Debug)]
struct Inner<V> {
    entries: HashMap<String, V>,
    /// Oldest first
    order: VecDeque<String>,
    loading: HashSet<String>,
}

/// LRU keyed by service id.
#[derive(Debug)]
pub struct MetadataCache<V> {
    capacity: usize,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> Default for MetadataCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<V: Clone> MetadataCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                loading: HashSet::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read an entry. Reads do not change recency.
    pub fn get(&self, id: &str) -> Option<V> {
        self.lock().entries.get(id).cloned()
    }

    /// Write an entry, moving it to the most-recent end.
    pub fn insert(&self, id: &str, value: V) {
        let mut inner = self.lock();
        if inner.entries.insert(id.to_string(), value).is_some() {
            inner.order.retain(|k| k != id);
        }
        inner.order.push_back(id.to_string());

        while inner.entries.len() > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
            log::debug!("Evicted {} from metadata cache", oldest);
        }
    }

    pub fn remove(&self, id: &str) -> Option<V> {
        let mut inner = self.lock();
        inner.order.retain(|k| k != id);
        inner.entries.remove(id)
    }

    /// Ids from oldest to most recently written.
    pub fn keys(&self) -> Vec<String> {
        self.lock().order.iter().cloned().collect()
    }

    pub fn is_loading(&self, id: &str) -> bool {
        self.lock().loading.contains(id)
    }

    /// Mark `id` as loading. Returns `None` if a load is already outstanding.
    /// The mark is cleared when the guard drops.
    pub fn begin_load(&self, id: &str) -> Option<LoadGuard<'_, V>> {
        let mut inner = self.lock();
        if !inner.loading.insert(id.to_string()) {
            return None;
        }
        Some(LoadGuard {
            cache: self,
            id: id.to_string(),
        })
    }

    /// Check for a cached value and take the loading mark under one lock.
    fn claim(&self, id: &str) -> Claim<'_, V> {
        let mut inner = self.lock();
        if let Some(value) = inner.entries.get(id) {
            return Claim::Cached(value.clone());
        }
        if !inner.loading.insert(id.to_string()) {
            return Claim::InFlight;
        }
        Claim::Load(LoadGuard {
            cache: self,
            id: id.to_string(),
        })
    }

    /// Return the cached value, or run `fetch` unless one is already
    /// outstanding for `id`.
    pub async fn get_or_fetch<F, Fut, E>(&self, id: &str, fetch: F) -> FetchOutcome<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let _guard = match self.claim(id) {
            Claim::Cached(value) => return FetchOutcome::Cached(value),
            Claim::InFlight => {
                log::debug!("Fetch for {} already in flight", id);
                return FetchOutcome::InFlight;
            }
            Claim::Load(guard) => guard,
        };

        match fetch().await {
            Ok(value) => {
                self.insert(id, value.clone());
                FetchOutcome::Fetched(value)
            }
            Err(e) => FetchOutcome::Failed(e),
        }
    }
}

enum Claim<'a, V> {
    Cached(V),
    InFlight,
    Load(LoadGuard<'a, V>),
}

/// Clears the loading mark for one id on drop.
pub struct LoadGuard<'a, V> {
    cache: &'a MetadataCache<V>,
    id: String,
}

impl<V> Drop for LoadGuard<'_, V> {
    fn drop(&mut self) {
        self.cache
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .loading
            .remove(&self.id);
    }
}
