//! Persistent coordinate -> place-name cache for the online tier.
//!
//! Keys are coordinates quantized to six decimals (`"{lat:.6},{lon:.6}"`).
//! Values are a place name or `null`, the negative entry meaning "looked up,
//! nothing usable, do not ask again".
//!
//! Lifecycle: load once at start, flush periodically, flush at the end. A
//! flush writes a full snapshot to a temporary file in the same directory and
//! renames it over the cache file, so an interrupted run leaves either the
//! old or the new snapshot on disk, never a torn file.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tempfile::NamedTempFile;

use crate::error::CacheError;

/// Canonical cache key for a coordinate.
///
/// ```
/// assert_eq!(route_cities::cache_key(35.1, -106.62), "35.100000,-106.620000");
/// ```
pub fn cache_key(latitude: f64, longitude: f64) -> String {
    format!("{:.6},{:.6}", latitude, longitude)
}

/// In-memory cache with an optional backing file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeocodeCache {
    path: Option<PathBuf>,
    entries: BTreeMap<String, Option<String>>,
}

impl GeocodeCache {
    /// A cache that is never persisted; `flush` is a no-op.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`, degrading to an empty cache on any problem.
    ///
    /// A missing file is the normal first-run case. An unreadable or corrupt
    /// file is logged and replaced on the next flush.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load_strict(&path) {
            Ok(cache) => cache,
            Err(e) => {
                warn!("[GeocodeCache] {}; starting with an empty cache", e);
                Self {
                    path: Some(path),
                    entries: BTreeMap::new(),
                }
            }
        }
    }

    /// Load from `path`, reporting unreadable or corrupt files.
    ///
    /// A missing file still yields an empty cache bound to `path`.
    pub fn load_strict(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("[GeocodeCache] No cache at {}, starting empty", path.display());
                return Ok(Self {
                    path: Some(path.to_path_buf()),
                    entries: BTreeMap::new(),
                });
            }
            Err(source) => {
                return Err(CacheError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let entries: BTreeMap<String, Option<String>> =
            serde_json::from_str(&text).map_err(|source| CacheError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        debug!("[GeocodeCache] Loaded {} entries from {}", entries.len(), path.display());
        Ok(Self {
            path: Some(path.to_path_buf()),
            entries,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Look up a key.
    ///
    /// `None` is a miss; `Some(None)` is a negative entry; `Some(Some(name))`
    /// is a cached place.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.entries.get(key).map(|v| v.as_deref())
    }

    pub fn insert(&mut self, key: impl Into<String>, place: Option<String>) {
        self.entries.insert(key.into(), place);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Negative entries currently held.
    pub fn negative_count(&self) -> usize {
        self.entries.values().filter(|v| v.is_none()).count()
    }

    /// Atomically replace the backing file with the current contents.
    ///
    /// Idempotent: each call writes the whole snapshot.
    pub fn flush(&self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let io_err = |source: std::io::Error| CacheError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&dir).map_err(io_err)?;
        let tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, &self.entries).map_err(|source| {
                CacheError::Json {
                    path: path.clone(),
                    source,
                }
            })?;
            writer.flush().map_err(io_err)?;
        }
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| CacheError::Persist {
            path: path.clone(),
            source: e.error,
        })?;

        debug!("[GeocodeCache] Flushed {} entries to {}", self.entries.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_format() {
        assert_eq!(cache_key(35.0844, -106.6504), "35.084400,-106.650400");
        assert_eq!(cache_key(1.0000004, 2.0), "1.000000,2.000000");
    }

    #[test]
    fn test_get_distinguishes_miss_and_negative() {
        let mut cache = GeocodeCache::in_memory();
        cache.insert("1.000000,2.000000", None);
        cache.insert("3.000000,4.000000", Some("Tulsa".to_string()));

        assert_eq!(cache.get("0.000000,0.000000"), None);
        assert_eq!(cache.get("1.000000,2.000000"), Some(None));
        assert_eq!(cache.get("3.000000,4.000000"), Some(Some("Tulsa")));
        assert_eq!(cache.negative_count(), 1);
    }

    #[test]
    fn test_flush_then_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = GeocodeCache::load(&path);
        assert!(cache.is_empty());
        cache.insert(cache_key(35.1, -106.62), Some("Albuquerque".to_string()));
        cache.insert(cache_key(36.5, -100.0), None);
        cache.flush().unwrap();

        let reloaded = GeocodeCache::load(&path);
        assert_eq!(reloaded, cache);
    }

    #[test]
    fn test_flush_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = GeocodeCache::load(&path);
        cache.insert("a", Some("Gallup".to_string()));
        cache.flush().unwrap();
        let first = fs::read_to_string(&path).unwrap();
        cache.flush().unwrap();
        let second = fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_persisted_negative_entry_is_null() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = GeocodeCache::load(&path);
        cache.insert("36.500000,-100.000000", None);
        cache.flush().unwrap();

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw["36.500000,-100.000000"].is_null());
    }

    #[test]
    fn test_corrupt_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(GeocodeCache::load_strict(&path), Err(CacheError::Json { .. })));

        let cache = GeocodeCache::load(&path);
        assert!(cache.is_empty());
        assert_eq!(cache.path(), Some(path.as_path()));
    }

    #[test]
    fn test_flush_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let mut cache = GeocodeCache::load(&path);
        cache.insert("k", Some("Taos".to_string()));
        cache.flush().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_in_memory_flush_is_noop() {
        let mut cache = GeocodeCache::in_memory();
        cache.insert("k", None);
        assert!(cache.flush().is_ok());
        assert!(cache.path().is_none());
    }
}
