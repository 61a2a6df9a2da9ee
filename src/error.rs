//! Error types for the fallible edges of the crate.
//!
//! The resolution pipeline itself never fails: collaborator errors become
//! negative cache entries and a corrupt cache file becomes an empty cache.
//! These types surface only where a caller explicitly asks for them.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Reading or writing the persisted geocode cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cache file {path} is not a valid key/name mapping: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cache snapshot could not replace {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cache snapshot for {path} was not written: {message}")]
    Task { path: PathBuf, message: String },
}

/// Failure of the external reverse-geocoding collaborator.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Building a [`PlaceFilter`](crate::PlaceFilter) from a custom rule table.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("rule {index} has an invalid route-code pattern: {source}")]
    Pattern {
        index: usize,
        #[source]
        source: regex::Error,
    },
}

/// Loading configuration, gazetteer or rule-table files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub(crate) fn read_json<T: serde::de::DeserializeOwned>(
        path: &std::path::Path,
    ) -> Result<T, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_json_missing_file() {
        let err = ConfigError::read_json::<serde_json::Value>(std::path::Path::new(
            "/nonexistent/route-cities.json",
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/route-cities.json"));
    }

    #[test]
    fn test_geocode_error_display() {
        assert_eq!(GeocodeError::Status(429).to_string(), "HTTP 429");
    }
}
