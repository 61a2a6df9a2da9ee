//! The full track -> city list pipeline.
//!
//! ```text
//! track -> reduce -> [ resolve -> filter -> record ] x workers -> CitySet
//! ```
//!
//! Every [`Strategy`] runs through the same code; the strategy only picks the
//! reducer mode and which resolver tiers are on. Sampled coordinates are
//! resolved by a bounded pool of concurrent workers. The cache is flushed
//! every `flush_every` cache writes and once more at the end, so stopping
//! between two coordinates loses at most the unflushed tail.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::cache::GeocodeCache;
use crate::cities::{ChronologicalEntry, CitySet, LongitudeTable, SpatialEntry};
use crate::error::ConfigError;
use crate::filter::{PlaceFilter, Verdict};
use crate::gazetteer::Gazetteer;
use crate::geo_utils::track_length_km;
use crate::geocoder::ReverseGeocoder;
use crate::reducer::{reduce, ReducerConfig, SamplingMode};
use crate::resolver::{RateLimit, Resolver, ResolverConfig, ResolverStats};
use crate::state::SharedState;
use crate::Coordinate;

/// Progress callback: `(completed, total)` sampled coordinates.
pub type ProgressCallback = Arc<dyn Fn(u32, u32) + Send + Sync>;

// ============================================================================
// Configuration
// ============================================================================

/// Which reducer and which resolver tiers a run uses.
///
/// | Strategy | Reducer | Offline tier | Online tier |
/// |----------|---------|--------------|-------------|
/// | `OfflineOnly` | composite | yes | no |
/// | `ApiOnly` | composite | no | yes |
/// | `Hybrid` | composite | yes | yes |
/// | `Segmented` | segment-stratified | yes | yes |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    OfflineOnly,
    ApiOnly,
    #[default]
    Hybrid,
    Segmented,
}

impl Strategy {
    pub fn sampling_mode(self) -> SamplingMode {
        match self {
            Strategy::Segmented => SamplingMode::Segmented,
            _ => SamplingMode::Composite,
        }
    }

    pub fn uses_offline(self) -> bool {
        !matches!(self, Strategy::ApiOnly)
    }

    pub fn uses_online(self) -> bool {
        !matches!(self, Strategy::OfflineOnly)
    }
}

/// Configuration for a [`CityFinder`] run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinderConfig {
    /// Default: Hybrid
    pub strategy: Strategy,

    pub reducer: ReducerConfig,

    /// Match radius for gazetteer entries without their own radius.
    /// Default: 25.0 km
    pub offline_radius_km: f64,

    /// Concurrent resolution workers.
    /// Default: 5
    pub workers: usize,

    /// Flush the cache after this many cache writes (0 = only at the end).
    /// Default: 10
    pub flush_every: usize,

    /// Pause after each geocoder call.
    pub rate_limit: RateLimit,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            reducer: ReducerConfig::default(),
            offline_radius_km: 25.0,
            workers: 5,
            flush_every: 10,
            rate_limit: RateLimit::default(),
        }
    }
}

impl FinderConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        ConfigError::read_json(path.as_ref())
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            offline_radius_km: self.offline_radius_km,
            offline_tier: self.strategy.uses_offline(),
            online_tier: self.strategy.uses_online(),
            rate_limit: self.rate_limit,
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct FinderReport {
    pub cities: CitySet,
    /// Cache contents after the run; already flushed if file-backed.
    pub cache: GeocodeCache,
    pub stats: ResolverStats,
    pub input_points: usize,
    /// Input points dropped for being out of range or non-finite
    pub invalid_points: usize,
    pub sampled_points: usize,
    /// Resolutions that passed the filter
    pub accepted: u32,
    /// Resolutions the filter rejected
    pub rejected: u32,
    /// Coordinates that resolved to no place
    pub unresolved: u32,
    pub elapsed: Duration,
    /// Set when the final cache flush failed.
    pub flush_error: Option<String>,
}

impl FinderReport {
    pub fn chronological(&self) -> Vec<ChronologicalEntry> {
        self.cities.chronological()
    }

    pub fn west_to_east(&self, table: &LongitudeTable) -> Vec<SpatialEntry> {
        self.cities.west_to_east(table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Accepted,
    Rejected,
    Unresolved,
}

// ============================================================================
// Finder
// ============================================================================

/// Runs the pipeline over a track.
///
/// ```no_run
/// use route_cities::{CityFinder, FinderConfig, Gazetteer, GeocodeCache, LongitudeTable, Strategy};
///
/// # async fn demo(track: Vec<route_cities::Coordinate>) {
/// let config = FinderConfig { strategy: Strategy::OfflineOnly, ..FinderConfig::default() };
/// let finder = CityFinder::new(config, Gazetteer::builtin());
/// let report = finder.run(&track, GeocodeCache::in_memory()).await;
/// for entry in report.west_to_east(&LongitudeTable::builtin()) {
///     println!("{:2}. {}", entry.index, entry.name);
/// }
/// # }
/// ```
pub struct CityFinder {
    config: FinderConfig,
    gazetteer: Gazetteer,
    filter: PlaceFilter,
    geocoder: Option<Arc<dyn ReverseGeocoder>>,
}

impl CityFinder {
    pub fn new(config: FinderConfig, gazetteer: Gazetteer) -> Self {
        Self {
            config,
            gazetteer,
            filter: PlaceFilter::default(),
            geocoder: None,
        }
    }

    pub fn with_filter(mut self, filter: PlaceFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    pub async fn run(&self, track: &[Coordinate], cache: GeocodeCache) -> FinderReport {
        self.run_with_progress(track, cache, None).await
    }

    pub async fn run_with_progress(
        &self,
        track: &[Coordinate],
        cache: GeocodeCache,
        on_progress: Option<ProgressCallback>,
    ) -> FinderReport {
        let start = Instant::now();
        let strategy = self.config.strategy;

        let valid: Vec<Coordinate> = track.iter().filter(|c| c.is_valid()).cloned().collect();
        let invalid_points = track.len() - valid.len();
        if invalid_points > 0 {
            warn!("[CityFinder] Dropped {} invalid coordinates", invalid_points);
        }

        info!(
            "[CityFinder] Starting {:?} run: {} points, {:.1} km of track, {} cached entries",
            strategy,
            valid.len(),
            track_length_km(&valid),
            cache.len()
        );

        let samples = reduce(&valid, &self.config.reducer, strategy.sampling_mode());
        let total = samples.len() as u32;
        debug!("[CityFinder] {} samples to resolve", samples.len());

        if strategy.uses_online() && self.geocoder.is_none() {
            warn!("[CityFinder] {:?} without a geocoder: cache misses stay unresolved", strategy);
        }

        let state = Arc::new(SharedState::new(cache));
        let resolver = Resolver::new(
            self.gazetteer.clone(),
            self.geocoder.clone(),
            Arc::clone(&state),
            self.config.resolver_config(),
        );
        let completed = AtomicU32::new(0);
        let flush_every = self.config.flush_every;

        let outcomes: Vec<Outcome> = stream::iter(samples)
            .map(|coord| {
                let resolver = &resolver;
                let filter = &self.filter;
                let state = &state;
                let completed = &completed;
                let callback = on_progress.clone();

                async move {
                    let outcome = match resolver.resolve(&coord).await {
                        None => Outcome::Unresolved,
                        Some(place) => match filter.classify(&place.name) {
                            Verdict::Place => {
                                if state.record_city(
                                    &place.name,
                                    coord.timestamp,
                                    coord.source_id.as_deref(),
                                ) {
                                    debug!("[CityFinder] New city: {} ({})", place.name, place.source);
                                }
                                Outcome::Accepted
                            }
                            verdict => {
                                debug!("[CityFinder] Rejected {:?}: {:?}", place.name, verdict);
                                Outcome::Rejected
                            }
                        },
                    };

                    match state.flush_if_due(flush_every).await {
                        Ok(true) => debug!("[CityFinder] Periodic cache flush"),
                        Ok(false) => {}
                        Err(e) => warn!("[CityFinder] Periodic cache flush failed: {}", e),
                    }

                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(ref cb) = callback {
                        cb(done, total);
                    }

                    outcome
                }
            })
            .buffer_unordered(self.config.workers.max(1))
            .collect()
            .await;

        let flush_error = match state.flush().await {
            Ok(()) => None,
            Err(e) => {
                warn!("[CityFinder] Final cache flush failed: {}", e);
                Some(e.to_string())
            }
        };

        let stats = resolver.stats();
        let (cache, cities) = state.snapshot();
        let count = |o: Outcome| outcomes.iter().filter(|&&x| x == o).count() as u32;
        let report = FinderReport {
            cities,
            cache,
            stats,
            input_points: track.len(),
            invalid_points,
            sampled_points: outcomes.len(),
            accepted: count(Outcome::Accepted),
            rejected: count(Outcome::Rejected),
            unresolved: count(Outcome::Unresolved),
            elapsed: start.elapsed(),
            flush_error,
        };

        info!(
            "[CityFinder] DONE: {} cities from {} samples in {:.2}s (offline {}, cache {}, API {} with {} failures, rejected {})",
            report.cities.len(),
            report.sampled_points,
            report.elapsed.as_secs_f64(),
            stats.offline_hits,
            stats.cache_hits,
            stats.api_calls,
            stats.api_failures,
            report.rejected
        );

        report
    }
}
