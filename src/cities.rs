//! Deduplicated city set and its two orderings.
//!
//! One [`CityRecord`] per accepted name, keyed by exact string equality. A
//! repeat sighting only ever moves `first_seen` earlier, so workers finishing
//! out of order still converge on the earliest timestamp.
//!
//! The views are computed on demand:
//! - **chronological**: by `first_seen`, untimed records last in insertion order
//! - **west to east**: by a longitude looked up in a [`LongitudeTable`]
//!
//! The longitude view is approximate. Names missing from the table fall back to
//! regional keyword buckets and then to a global default, so its order is only
//! as good as the table. When timestamps are available the chronological view
//! is the exact one.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::CityRecord;

// ============================================================================
// City set
// ============================================================================

/// A position in the chronological view (1-based).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChronologicalEntry {
    pub index: usize,
    pub name: String,
}

/// A position in the west-to-east view (1-based).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialEntry {
    pub index: usize,
    pub name: String,
    pub longitude: f64,
}

/// Insertion-ordered set of city records, unique by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CitySet {
    records: Vec<CityRecord>,
    index: HashMap<String, usize>,
}

impl CitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sighting of `name`.
    ///
    /// Returns `true` if the name was new. For a known name `first_seen` is
    /// set to the earlier of the stored and the new timestamp (a timestamp
    /// beats none), and `source_file` follows whichever sighting won.
    pub fn record(
        &mut self,
        name: &str,
        timestamp: Option<DateTime<Utc>>,
        source: Option<&str>,
    ) -> bool {
        if let Some(&i) = self.index.get(name) {
            let existing = &mut self.records[i];
            if let Some(ts) = timestamp {
                if existing.first_seen.map_or(true, |current| ts < current) {
                    existing.first_seen = Some(ts);
                    existing.source_file = source.map(str::to_string);
                }
            }
            return false;
        }

        self.index.insert(name.to_string(), self.records.len());
        self.records.push(CityRecord {
            name: name.to_string(),
            first_seen: timestamp,
            source_file: source.map(str::to_string),
        });
        true
    }

    pub fn get(&self, name: &str) -> Option<&CityRecord> {
        self.index.get(name).map(|&i| &self.records[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Records in the order their names were first accepted.
    pub fn records(&self) -> &[CityRecord] {
        &self.records
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ascending by `first_seen`; untimed records last, stable.
    pub fn chronological(&self) -> Vec<ChronologicalEntry> {
        let mut order: Vec<&CityRecord> = self.records.iter().collect();
        order.sort_by_key(|r| (r.first_seen.is_none(), r.first_seen));

        order
            .into_iter()
            .enumerate()
            .map(|(i, r)| ChronologicalEntry {
                index: i + 1,
                name: r.name.clone(),
            })
            .collect()
    }

    /// Ascending by looked-up longitude, stable on ties.
    pub fn west_to_east(&self, table: &LongitudeTable) -> Vec<SpatialEntry> {
        let mut order: Vec<(&CityRecord, f64)> = self
            .records
            .iter()
            .map(|r| (r, table.longitude_for(&r.name)))
            .collect();
        order.sort_by(|a, b| a.1.total_cmp(&b.1));

        order
            .into_iter()
            .enumerate()
            .map(|(i, (r, longitude))| SpatialEntry {
                index: i + 1,
                name: r.name.clone(),
                longitude,
            })
            .collect()
    }
}

// ============================================================================
// Longitude reference table
// ============================================================================

/// A keyword bucket: names containing `keyword` get `longitude`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalBucket {
    pub keyword: String,
    pub longitude: f64,
}

/// Name -> approximate longitude, with keyword and global fallbacks.
///
/// Lookup order: exact name, then the first regional bucket whose keyword
/// the name contains, then `default_longitude`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LongitudeTable {
    pub known: HashMap<String, f64>,
    pub regional: Vec<RegionalBucket>,
    /// Default: -100.0, roughly mid-continent
    pub default_longitude: f64,
}

impl Default for LongitudeTable {
    fn default() -> Self {
        Self {
            known: HashMap::new(),
            regional: Vec::new(),
            default_longitude: -100.0,
        }
    }
}

impl LongitudeTable {
    /// Towns along a southern Los Angeles to New York crossing.
    ///
    /// Many values are rounded to the nearest degree; treat them as ordering
    /// hints only.
    pub fn builtin() -> Self {
        let known = KNOWN_LONGITUDES
            .iter()
            .map(|&(name, lon)| (name.to_string(), lon))
            .collect();
        let regional = ["Township", "Pennsylvania"]
            .into_iter()
            .map(|keyword| RegionalBucket {
                keyword: keyword.to_string(),
                longitude: -77.0,
            })
            .collect();

        Self {
            known,
            regional,
            ..Self::default()
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        ConfigError::read_json(path.as_ref())
    }

    pub fn longitude_for(&self, name: &str) -> f64 {
        if let Some(&lon) = self.known.get(name) {
            return lon;
        }
        self.regional
            .iter()
            .find(|b| name.contains(b.keyword.as_str()))
            .map_or(self.default_longitude, |b| b.longitude)
    }
}

const KNOWN_LONGITUDES: &[(&str, f64)] = &[
    // California
    ("Los Angeles", -118.2437),
    ("Santa Monica", -118.4912),
    ("San Gabriel", -118.1088),
    ("Glendora", -117.8653),
    ("Rancho Cucamonga", -117.5859),
    ("Fontana", -117.4359),
    ("Cajon", -117.4),
    ("Hesperia", -117.3006),
    ("Apple Valley", -117.1859),
    ("Lucerne Valley", -116.9667),
    ("Yucca Valley", -116.4167),
    ("Twentynine Palms", -116.0547),
    // Arizona
    ("Bullhead City", -114.5686),
    ("Golden Valley", -114.1236),
    ("New Kingman-Butler", -114.0167),
    ("Flagstaff", -111.6513),
    ("Sedona", -111.7610),
    ("Holbrook", -110.1623),
    ("Winslow", -110.6973),
    ("Sun Valley", -110.0),
    // New Mexico
    ("Albuquerque", -106.6504),
    ("Gallup", -108.7426),
    ("Madrid", -106.1536),
    ("Tesuque", -105.9208),
    ("Sombrillo", -106.0),
    ("Valle Escondido", -105.5),
    ("Eagle Nest", -105.4667),
    ("Rayado", -105.0),
    ("Springer", -104.5),
    ("Stillwater", -104.0),
    // Oklahoma
    ("Tulsa", -95.9928),
    ("Sapulpa", -95.8170),
    ("Broken Arrow", -95.8170),
    // Arkansas, Missouri, Illinois
    ("Fayetteville", -94.1574),
    ("Mountain Home", -92.3853),
    ("Fairdealing", -90.0),
    ("Poplar Bluff", -90.3926),
    ("Dexter", -89.9587),
    ("Grayridge", -89.0),
    ("Carrier Mills", -88.0),
    ("Eldorado", -88.0),
    ("Norris City", -88.0),
    ("Crossville", -88.0),
    ("New Burnside", -88.0),
    ("Vienna", -88.0),
    ("Mound City", -88.0),
    // Indiana
    ("Vincennes", -87.5286),
    ("Bicknell", -87.3078),
    ("Keensburg", -87.0),
    ("Grayville", -87.0),
    // Ohio
    ("Dayton", -84.1916),
    ("Beavercreek", -84.0633),
    ("Cedarville", -83.8083),
    ("Zanesville", -82.0132),
    ("New Lexington", -82.2081),
    // West Virginia
    ("Wheeling", -80.7209),
    // Pennsylvania
    ("Allentown", -75.4638),
    ("Bethlehem", -75.3705),
    ("East Hanover Township", -76.0),
    ("Bethel Township", -76.0),
    ("Greenwich Township", -75.0),
    ("Jefferson Township", -75.0),
    ("Donegal Township", -79.0),
    ("Dublin Township", -79.0),
    ("Elizabeth Township", -79.0),
    ("East Huntingdon Township", -79.0),
    ("Mount Pleasant Township", -79.0),
    ("Susquehanna Township", -76.0),
    ("Upper Bern Township", -76.0),
    ("West Pennsboro Township", -77.0),
    ("Lurgan Township", -77.0),
    ("Brush Creek Township", -78.0),
    ("Stonycreek Township", -78.0),
    ("North Franklin Township", -80.0),
    ("Nottingham Township", -80.0),
    ("Napier Township", -78.0),
    ("Monroe Township", -76.0),
    ("Metal Township", -77.0),
    // New Jersey and New York
    ("Hackensack", -74.0431),
    ("Rockaway Township", -74.0),
    ("Fairfield", -74.0),
    ("New York", -74.0060),
];

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> Option<DateTime<Utc>> {
        Some(Utc.timestamp_opt(secs, 0).unwrap())
    }

    fn names(entries: &[ChronologicalEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_dedup_keeps_earliest_timestamp() {
        let mut set = CitySet::new();
        assert!(set.record("Tulsa", t(3), None));
        assert!(!set.record("Tulsa", t(1), None));
        assert!(set.record("Santa Fe", t(2), None));
        assert!(!set.record("Tulsa", t(5), None));

        assert_eq!(set.len(), 2);
        assert_eq!(set.get("Tulsa").unwrap().first_seen, t(1));
        assert_eq!(set.get("Santa Fe").unwrap().first_seen, t(2));
        assert_eq!(names(&set.chronological()), vec!["Tulsa", "Santa Fe"]);
    }

    #[test]
    fn test_source_follows_earliest_sighting() {
        let mut set = CitySet::new();
        set.record("Gallup", t(10), Some("day-3.gpx"));
        set.record("Gallup", t(20), Some("day-4.gpx"));
        assert_eq!(set.get("Gallup").unwrap().source_file.as_deref(), Some("day-3.gpx"));

        set.record("Gallup", t(5), Some("day-2.gpx"));
        assert_eq!(set.get("Gallup").unwrap().source_file.as_deref(), Some("day-2.gpx"));
    }

    #[test]
    fn test_timestamp_beats_none() {
        let mut set = CitySet::new();
        set.record("Taos", None, None);
        set.record("Taos", t(7), Some("a.gpx"));
        assert_eq!(set.get("Taos").unwrap().first_seen, t(7));

        // A later untimed sighting does not erase it
        set.record("Taos", None, Some("b.gpx"));
        assert_eq!(set.get("Taos").unwrap().first_seen, t(7));
        assert_eq!(set.get("Taos").unwrap().source_file.as_deref(), Some("a.gpx"));
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let mut set = CitySet::new();
        set.record("Madrid", None, None);
        set.record("madrid", None, None);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_untimed_records_sort_last_and_stable() {
        let mut set = CitySet::new();
        set.record("B", None, None);
        set.record("A", t(9), None);
        set.record("C", None, None);
        set.record("D", t(4), None);

        let chrono = set.chronological();
        assert_eq!(names(&chrono), vec!["D", "A", "B", "C"]);
        assert_eq!(chrono.iter().map(|e| e.index).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_west_to_east_with_fallbacks() {
        let mut set = CitySet::new();
        for name in ["New York", "Lower Paxton Township", "Unknownville", "Tulsa", "Los Angeles"] {
            set.record(name, None, None);
        }

        let table = LongitudeTable::builtin();
        let view = set.west_to_east(&table);
        let order: Vec<&str> = view.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            order,
            vec!["Los Angeles", "Unknownville", "Tulsa", "Lower Paxton Township", "New York"]
        );
        assert_eq!(view[1].longitude, -100.0);
        assert_eq!(view[3].longitude, -77.0);
        assert_eq!(view[4].index, 5);
    }

    #[test]
    fn test_west_to_east_ties_keep_insertion_order() {
        let mut set = CitySet::new();
        set.record("Sapulpa", None, None);
        set.record("Broken Arrow", None, None);
        let view = set.west_to_east(&LongitudeTable::builtin());
        assert_eq!(view[0].name, "Sapulpa");
        assert_eq!(view[1].name, "Broken Arrow");
    }

    #[test]
    fn test_longitude_table_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("longitudes.json");
        std::fs::write(
            &path,
            r#"{"known": {"Tulsa": -95.99}, "regional": [{"keyword": "County", "longitude": -90.0}]}"#,
        )
        .unwrap();

        let table = LongitudeTable::from_json_file(&path).unwrap();
        assert_eq!(table.longitude_for("Tulsa"), -95.99);
        assert_eq!(table.longitude_for("Bucks County"), -90.0);
        assert_eq!(table.longitude_for("Elsewhere"), -100.0);
    }
}
