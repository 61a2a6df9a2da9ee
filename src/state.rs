//! The single serialized access point for state shared between workers.
//!
//! Workers resolve coordinates independently, but the geocode cache and the
//! city set are one mutable whole guarded by one lock. Cache reads and
//! writes, city updates and flushes all go through it, so no worker keeps a
//! private copy that could drift. The lock is never held across an `.await`.
//!
//! A key being looked up by one worker is tracked as in flight; other workers
//! asking for the same key wait on that lookup instead of starting their own.
//!
//! Flushes write a snapshot of the cache on the blocking pool. A separate
//! async lock orders them, so a later flush never lands before an earlier one.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::cache::GeocodeCache;
use crate::cities::CitySet;
use crate::error::CacheError;

/// Result slot for one in-flight lookup, shared by every worker waiting on it.
pub type PendingLookup = Arc<OnceCell<Option<String>>>;

/// Answer to [`SharedState::claim`].
#[derive(Debug)]
pub enum CacheClaim {
    /// Already cached; `None` is a negative entry.
    Cached(Option<String>),
    /// Not cached yet. The first worker to initialize the slot does the
    /// lookup; the rest receive its result.
    Pending(PendingLookup),
}

#[derive(Debug, Default)]
struct TripState {
    cache: GeocodeCache,
    cities: CitySet,
    in_flight: HashMap<String, PendingLookup>,
    /// Cache writes since the last flush
    pending_writes: usize,
}

/// Cache + city set behind one mutex.
#[derive(Debug, Default)]
pub struct SharedState {
    inner: Mutex<TripState>,
    flush_order: tokio::sync::Mutex<()>,
}

impl SharedState {
    pub fn new(cache: GeocodeCache) -> Self {
        Self {
            inner: Mutex::new(TripState {
                cache,
                cities: CitySet::default(),
                in_flight: HashMap::new(),
                pending_writes: 0,
            }),
            flush_order: tokio::sync::Mutex::new(()),
        }
    }

    /// `None` on a miss, `Some(None)` for a negative entry.
    pub fn cache_lookup(&self, key: &str) -> Option<Option<String>> {
        self.inner
            .lock()
            .cache
            .get(key)
            .map(|v| v.map(str::to_string))
    }

    /// Cached value for `key`, or the slot of the lookup in flight for it
    /// (registered now if nobody is looking it up yet).
    pub fn claim(&self, key: &str) -> CacheClaim {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        if let Some(cached) = state.cache.get(key) {
            return CacheClaim::Cached(cached.map(str::to_string));
        }
        let slot = state.in_flight.entry(key.to_string()).or_default();
        CacheClaim::Pending(Arc::clone(slot))
    }

    /// Store a lookup result and retire its in-flight slot in one step.
    pub fn cache_store(&self, key: String, place: Option<String>) {
        let mut state = self.inner.lock();
        state.in_flight.remove(&key);
        state.cache.insert(key, place);
        state.pending_writes += 1;
    }

    /// Lookups currently in flight.
    pub fn in_flight_len(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    /// Record an accepted place; see [`CitySet::record`].
    pub fn record_city(
        &self,
        name: &str,
        timestamp: Option<DateTime<Utc>>,
        source: Option<&str>,
    ) -> bool {
        self.inner.lock().cities.record(name, timestamp, source)
    }

    /// Flush once at least `every` cache writes have piled up.
    ///
    /// Returns whether a flush happened. `every == 0` disables periodic
    /// flushing.
    pub async fn flush_if_due(&self, every: usize) -> Result<bool, CacheError> {
        if every == 0 {
            return Ok(false);
        }
        let _order = self.flush_order.lock().await;
        let Some(snapshot) = self.take_snapshot(Some(every)) else {
            return Ok(false);
        };
        Self::write(snapshot).await?;
        Ok(true)
    }

    /// Unconditional flush of the current cache snapshot.
    pub async fn flush(&self) -> Result<(), CacheError> {
        let _order = self.flush_order.lock().await;
        if let Some(snapshot) = self.take_snapshot(None) {
            Self::write(snapshot).await?;
        }
        Ok(())
    }

    /// Copy the cache for writing and reset the write counter. `None` when
    /// fewer than `due` writes are pending or there is no backing file.
    fn take_snapshot(&self, due: Option<usize>) -> Option<GeocodeCache> {
        let mut state = self.inner.lock();
        if due.is_some_and(|every| state.pending_writes < every) {
            return None;
        }
        state.pending_writes = 0;
        state.cache.path()?;
        Some(state.cache.clone())
    }

    async fn write(snapshot: GeocodeCache) -> Result<(), CacheError> {
        let path = snapshot.path().map(|p| p.to_path_buf()).unwrap_or_default();
        tokio::task::spawn_blocking(move || snapshot.flush())
            .await
            .map_err(|e| CacheError::Task {
                path,
                message: e.to_string(),
            })?
    }

    pub fn cache_len(&self) -> usize {
        self.inner.lock().cache.len()
    }

    /// Copies of the cache and city set as they stand.
    pub fn snapshot(&self) -> (GeocodeCache, CitySet) {
        let state = self.inner.lock();
        (state.cache.clone(), state.cities.clone())
    }
}
