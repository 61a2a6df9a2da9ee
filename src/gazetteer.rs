//! Offline gazetteer: the first resolution tier.
//!
//! A gazetteer is an ordered list of known places. It is never keyed by
//! coordinate: several towns can legitimately share (or nearly share) a
//! coordinate, and a map would silently drop all but one of them. When two
//! entries are equally near, the one listed first wins.

use std::path::Path;

use log::debug;

use crate::error::ConfigError;
use crate::geo_utils::haversine_distance_km;
use crate::{Coordinate, GazetteerEntry};

/// Ordered table of known places.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gazetteer {
    entries: Vec<GazetteerEntry>,
}

impl Gazetteer {
    pub fn new(entries: Vec<GazetteerEntry>) -> Self {
        Self { entries }
    }

    /// Load a JSON array of `{latitude, longitude, name, radius_km?}` objects.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let entries: Vec<GazetteerEntry> = ConfigError::read_json(path.as_ref())?;
        debug!("[Gazetteer] Loaded {} entries from {}", entries.len(), path.as_ref().display());
        Ok(Self::new(entries))
    }

    /// Major cities along a Los Angeles to New York crossing.
    ///
    /// Several entries share a coordinate (a placeholder position reused for
    /// nearby towns). They are all kept; lookups at that position return the
    /// first one listed.
    pub fn builtin() -> Self {
        let entries = BUILTIN_PLACES
            .iter()
            .map(|&(lat, lon, name)| GazetteerEntry::new(lat, lon, name))
            .collect();
        Self::new(entries)
    }

    pub fn entries(&self) -> &[GazetteerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the nearest entry and return it if it lies within its radius.
    ///
    /// Linear scan over every entry. Only the single nearest entry (first in
    /// list order on ties) is considered; its own `radius_km` applies, or
    /// `default_radius_km` when unset.
    pub fn lookup(&self, coord: &Coordinate, default_radius_km: f64) -> Option<&GazetteerEntry> {
        let mut nearest: Option<(&GazetteerEntry, f64)> = None;

        for entry in &self.entries {
            let d = haversine_distance_km(
                coord,
                &Coordinate::new(entry.latitude, entry.longitude),
            );
            if nearest.map_or(true, |(_, best)| d < best) {
                nearest = Some((entry, d));
            }
        }

        let (entry, distance) = nearest?;
        let radius = entry.radius_km.unwrap_or(default_radius_km);
        (distance <= radius).then_some(entry)
    }
}

const BUILTIN_PLACES: &[(f64, f64, &str)] = &[
    // California
    (34.0522, -118.2437, "Los Angeles"),
    (37.7749, -122.4194, "San Francisco"),
    (34.0522, -118.2437, "Santa Monica"),
    (34.1478, -118.1445, "Pasadena"),
    (33.6846, -117.8265, "Irvine"),
    (33.7701, -118.1937, "Long Beach"),
    (34.1808, -118.3090, "Burbank"),
    (34.0736, -117.3137, "Fontana"),
    (34.1064, -117.5931, "Rancho Cucamonga"),
    (34.1064, -117.5931, "Pomona"),
    (34.1064, -117.5931, "Victorville"),
    // Arizona
    (33.4484, -112.0740, "Phoenix"),
    (32.2226, -110.9747, "Tucson"),
    (35.1983, -111.6513, "Flagstaff"),
    (35.1859, -111.6643, "Kingman"),
    (35.1859, -111.6643, "Bullhead City"),
    // New Mexico
    (35.0844, -106.6504, "Albuquerque"),
    (35.6869, -105.9378, "Santa Fe"),
    (36.4072, -105.5731, "Taos"),
    (35.5281, -108.7426, "Gallup"),
    // Oklahoma
    (36.1540, -95.9928, "Tulsa"),
    (35.4676, -97.5164, "Oklahoma City"),
    (35.7478, -95.3697, "Tahlequah"),
    // Arkansas
    (35.2010, -91.8318, "St. Francisville"),
    // Tennessee
    (36.1627, -86.7816, "Nashville"),
    (35.0456, -85.3097, "Chattanooga"),
    // Ohio
    (39.9612, -82.9988, "Columbus"),
    (39.7589, -84.1916, "Dayton"),
    (39.1031, -84.5120, "Cincinnati"),
    (39.9612, -82.9988, "Xenia"),
    (39.9612, -82.9988, "Zanesville"),
    // Pennsylvania and New York
    (40.7128, -74.0060, "New York"),
    (40.2732, -76.8847, "Harrisburg"),
    (40.2732, -76.8847, "Allentown"),
    (40.2732, -76.8847, "Bethlehem"),
    (40.2732, -76.8847, "Easton"),
];
