//! Two-tier place resolution for a single coordinate.
//!
//! | Tier | Source | Side effects |
//! |------|--------|--------------|
//! | 1 | Gazetteer, nearest entry within its radius | none |
//! | 2 | Cache, then the reverse geocoder on a miss | cache write, rate-limit delay |
//!
//! Every geocoder outcome, including failures and "nothing usable", is
//! written back to the cache before returning, so a coordinate is asked about
//! at most once across runs. Failures never reach the caller. Workers that
//! miss on a key another worker is already looking up wait for that answer.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cache::{cache_key, GeocodeCache};
use crate::gazetteer::Gazetteer;
use crate::geocoder::{extract_place_name, ReverseGeocoder};
use crate::state::{CacheClaim, SharedState};
use crate::{Coordinate, PlaceSource, ResolvedPlace};

// ============================================================================
// Configuration
// ============================================================================

/// Randomized pause after each geocoder call.
///
/// The pause runs on the worker that made the call; other workers keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimit {
    /// Lower bound of the delay in milliseconds.
    /// Default: 500
    pub min_delay_ms: u64,

    /// Upper bound of the delay in milliseconds (inclusive).
    /// Default: 1500
    pub max_delay_ms: u64,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            min_delay_ms: 500,
            max_delay_ms: 1500,
        }
    }
}

impl RateLimit {
    /// No delay at all. Meant for tests and local geocoders.
    pub fn none() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Draw one delay. Swapped bounds are tolerated.
    pub fn pick_delay(&self) -> Duration {
        let lo = self.min_delay_ms.min(self.max_delay_ms);
        let hi = self.min_delay_ms.max(self.max_delay_ms);
        if hi == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }
}

/// Resolver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Match radius for gazetteer entries without their own radius.
    /// Default: 25.0 km
    pub offline_radius_km: f64,

    /// Consult the gazetteer.
    /// Default: true
    pub offline_tier: bool,

    /// Consult cache and geocoder when the gazetteer has nothing.
    /// Default: true
    pub online_tier: bool,

    /// Pause after each geocoder call.
    pub rate_limit: RateLimit,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            offline_radius_km: 25.0,
            offline_tier: true,
            online_tier: true,
            rate_limit: RateLimit::default(),
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Counters over the lifetime of one resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverStats {
    pub offline_hits: u32,
    pub cache_hits: u32,
    /// Cache hits on a negative entry
    pub negative_hits: u32,
    pub api_calls: u32,
    /// Calls that failed outright (transport, status, decode)
    pub api_failures: u32,
    /// Calls that succeeded but yielded no usable name
    pub api_empty: u32,
}

#[derive(Debug, Default)]
struct Counters {
    offline_hits: AtomicU32,
    cache_hits: AtomicU32,
    negative_hits: AtomicU32,
    api_calls: AtomicU32,
    api_failures: AtomicU32,
    api_empty: AtomicU32,
}

impl Counters {
    fn bump(counter: &AtomicU32) -> u32 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn snapshot(&self) -> ResolverStats {
        ResolverStats {
            offline_hits: self.offline_hits.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            negative_hits: self.negative_hits.load(Ordering::Relaxed),
            api_calls: self.api_calls.load(Ordering::Relaxed),
            api_failures: self.api_failures.load(Ordering::Relaxed),
            api_empty: self.api_empty.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Gazetteer + cache + geocoder behind one `resolve` call.
///
/// Safe to share between concurrent workers (`&Resolver` is enough); all
/// mutable state lives in the [`SharedState`].
pub struct Resolver {
    gazetteer: Gazetteer,
    geocoder: Option<Arc<dyn ReverseGeocoder>>,
    state: Arc<SharedState>,
    config: ResolverConfig,
    counters: Counters,
}

impl Resolver {
    pub fn new(
        gazetteer: Gazetteer,
        geocoder: Option<Arc<dyn ReverseGeocoder>>,
        state: Arc<SharedState>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            gazetteer,
            geocoder,
            state,
            config,
            counters: Counters::default(),
        }
    }

    /// A resolver with no geocoder and an in-memory cache.
    pub fn offline(gazetteer: Gazetteer, config: ResolverConfig) -> Self {
        Self::new(
            gazetteer,
            None,
            Arc::new(SharedState::new(GeocodeCache::in_memory())),
            config,
        )
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn stats(&self) -> ResolverStats {
        self.counters.snapshot()
    }

    /// Tier 1 alone: the nearest gazetteer entry, if within its radius.
    ///
    /// Ignores `offline_tier`; counts a hit.
    pub fn resolve_offline(&self, coord: &Coordinate) -> Option<ResolvedPlace> {
        let entry = self.gazetteer.lookup(coord, self.config.offline_radius_km)?;
        Counters::bump(&self.counters.offline_hits);
        Some(ResolvedPlace {
            name: entry.name.clone(),
            coordinate: coord.clone(),
            source: PlaceSource::Offline,
        })
    }

    /// Resolve a coordinate to a place name, or `None`.
    ///
    /// Never fails. Calling it twice for the same coordinate gives the same
    /// answer, and the second call never reaches the geocoder.
    pub async fn resolve(&self, coord: &Coordinate) -> Option<ResolvedPlace> {
        if self.config.offline_tier {
            if let Some(place) = self.resolve_offline(coord) {
                debug!("[Resolver] {} (offline)", place.name);
                return Some(place);
            }
        }

        if !self.config.online_tier {
            return None;
        }

        let key = cache_key(coord.latitude, coord.longitude);
        let Some(geocoder) = self.geocoder.as_ref() else {
            let cached = self.state.cache_lookup(&key)?;
            return self.cached_place(coord, &key, cached);
        };

        let slot = match self.state.claim(&key) {
            CacheClaim::Cached(cached) => return self.cached_place(coord, &key, cached),
            CacheClaim::Pending(slot) => slot,
        };

        // Only the worker that runs the init closure calls the geocoder; the
        // others wait for its answer and count it as a cache hit.
        let called = AtomicBool::new(false);
        let name = {
            let (called, key) = (&called, &key);
            slot.get_or_init(|| async move {
                called.store(true, Ordering::Relaxed);
                let name = self.call_geocoder(geocoder.as_ref(), coord, key).await;
                self.state.cache_store(key.clone(), name.clone());
                name
            })
            .await
            .clone()
        };

        if !called.load(Ordering::Relaxed) {
            return self.cached_place(coord, &key, name);
        }

        let delay = self.config.rate_limit.pick_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        name.map(|name| ResolvedPlace {
            name,
            coordinate: coord.clone(),
            source: PlaceSource::Api,
        })
    }

    fn cached_place(
        &self,
        coord: &Coordinate,
        key: &str,
        cached: Option<String>,
    ) -> Option<ResolvedPlace> {
        match cached {
            Some(name) => {
                Counters::bump(&self.counters.cache_hits);
                debug!("[Resolver] {} (cache {})", name, key);
                Some(ResolvedPlace {
                    name,
                    coordinate: coord.clone(),
                    source: PlaceSource::Cache,
                })
            }
            None => {
                Counters::bump(&self.counters.negative_hits);
                debug!("[Resolver] {} cached as no place", key);
                None
            }
        }
    }

    async fn call_geocoder(
        &self,
        geocoder: &dyn ReverseGeocoder,
        coord: &Coordinate,
        key: &str,
    ) -> Option<String> {
        let call = Counters::bump(&self.counters.api_calls);

        match geocoder.reverse(coord.latitude, coord.longitude).await {
            Ok(Some(response)) => {
                let name = extract_place_name(&response);
                match &name {
                    Some(n) => debug!("[Resolver] API call {}: {} -> {}", call, key, n),
                    None => {
                        Counters::bump(&self.counters.api_empty);
                        debug!("[Resolver] API call {}: {} has no usable name", call, key);
                    }
                }
                name
            }
            Ok(None) => {
                Counters::bump(&self.counters.api_empty);
                debug!("[Resolver] API call {}: {} has no result", call, key);
                None
            }
            Err(e) => {
                Counters::bump(&self.counters.api_failures);
                warn!("[Resolver] API call {} for {} failed: {}", call, key, e);
                None
            }
        }
    }
}
