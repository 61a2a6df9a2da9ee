//! # Route Cities
//!
//! Reduce a dense GPS trip track to the short, ordered list of towns it
//! passed through, while keeping reverse-geocoding calls to a minimum.
//!
//! This library provides:
//! - Track reduction (radius clustering, farthest-point and segment sampling)
//! - Two-tier place resolution: an offline gazetteer, then a cached reverse geocoder
//! - A data-driven filter that rejects road and route names posing as places
//! - A deduplicated city set with chronological and west-to-east views
//!
//! ## Features
//!
//! - **`parallel`** - Parallel distance updates in farthest-point sampling (rayon)
//! - **`http`** - Nominatim reverse-geocoding client (reqwest)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use route_cities::{Coordinate, Gazetteer, GazetteerEntry, Resolver, ResolverConfig};
//!
//! let gazetteer = Gazetteer::new(vec![
//!     GazetteerEntry::new(35.0844, -106.6504, "Albuquerque").with_radius(30.0),
//! ]);
//!
//! let resolver = Resolver::offline(gazetteer, ResolverConfig::default());
//! let place = resolver.resolve_offline(&Coordinate::new(35.10, -106.62));
//! assert_eq!(place.map(|p| p.name), Some("Albuquerque".to_string()));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{CacheError, ConfigError, FilterError, GeocodeError};

pub mod geo_utils;

// Track reduction
pub mod reducer;
pub use reducer::{
    cluster_by_radius, farthest_point_sample, reduce, segment_sample, ReducerConfig,
    SamplingMode,
};

// Offline tier
pub mod gazetteer;
pub use gazetteer::Gazetteer;

// Persistent coordinate -> place cache
pub mod cache;
pub use cache::{cache_key, GeocodeCache};

// External reverse-geocoding contract
pub mod geocoder;
pub use geocoder::{extract_place_name, GeocodeResponse, ReverseGeocoder};

#[cfg(feature = "http")]
pub mod nominatim;

#[cfg(feature = "http")]
pub use nominatim::{NominatimClient, NominatimConfig};

pub mod state;
pub use state::SharedState;

pub mod resolver;
pub use resolver::{RateLimit, Resolver, ResolverConfig, ResolverStats};

pub mod filter;
pub use filter::{FilterRule, PlaceFilter, RuleKind, RuleTable, Verdict};

pub mod cities;
pub use cities::{ChronologicalEntry, CitySet, LongitudeTable, SpatialEntry};

pub mod pipeline;
pub use pipeline::{CityFinder, FinderConfig, FinderReport, ProgressCallback, Strategy};

// ============================================================================
// Core Types
// ============================================================================

/// A track point: latitude/longitude with optional timestamp and source.
///
/// Produced once by the track parser and never mutated afterwards.
///
/// # Example
/// ```
/// use route_cities::Coordinate;
/// let point = Coordinate::new(36.1540, -95.9928).with_source("day-12.gpx");
/// assert_eq!(point.source_id.as_deref(), Some("day-12.gpx"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

impl Coordinate {
    /// Create a coordinate without timestamp or source.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp: None,
            source_id: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// A known place in the offline gazetteer.
///
/// Entries are kept in list order; two entries may share a coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GazetteerEntry {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    /// Match radius for this entry. Falls back to the resolver's
    /// `offline_radius_km` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius_km: Option<f64>,
}

impl GazetteerEntry {
    pub fn new(latitude: f64, longitude: f64, name: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            name: name.into(),
            radius_km: None,
        }
    }

    pub fn with_radius(mut self, radius_km: f64) -> Self {
        self.radius_km = Some(radius_km);
        self
    }
}

/// Which resolution tier produced a place name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceSource {
    Offline,
    Cache,
    Api,
}

impl std::fmt::Display for PlaceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlaceSource::Offline => "offline",
            PlaceSource::Cache => "cache",
            PlaceSource::Api => "api",
        };
        f.write_str(s)
    }
}

/// A place name resolved for one sampled coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPlace {
    pub name: String,
    pub coordinate: Coordinate,
    pub source: PlaceSource,
}

/// One entry of the deduplicated city set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityRecord {
    /// Unique key: exact string equality after filtering
    pub name: String,
    /// Earliest timestamp at which the city was resolved
    pub first_seen: Option<DateTime<Utc>>,
    /// Source (track file) of the earliest sighting
    pub source_file: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
