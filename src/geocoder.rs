//! Contract for the external reverse-geocoding service.
//!
//! A collaborator answers `reverse(lat, lon)` with a structured address
//! breakdown, a free-text display name, both, or an error. The resolver only
//! needs a single place name out of that, picked by [`extract_place_name`].

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GeocodeError;

/// Address component kinds, most specific settlement first.
pub const PLACE_COMPONENTS: [&str; 6] = ["city", "town", "village", "hamlet", "municipality", "suburb"];

/// What a reverse lookup returned.
///
/// Either field may be missing; a response with neither is treated as "no
/// place".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResponse {
    #[serde(default)]
    pub address: Option<HashMap<String, String>>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl GeocodeResponse {
    pub fn from_address<I, K, V>(components: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            address: Some(
                components
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            display_name: None,
        }
    }

    pub fn from_display_name(display_name: impl Into<String>) -> Self {
        Self {
            address: None,
            display_name: Some(display_name.into()),
        }
    }
}

/// A reverse-geocoding service.
///
/// `Ok(None)` means the service had no result for the coordinate at all.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, latitude: f64, longitude: f64)
        -> Result<Option<GeocodeResponse>, GeocodeError>;
}

/// Pick a place name from a response.
///
/// Tries the address components in [`PLACE_COMPONENTS`] order, then the first
/// comma-separated segment of the display name. Blank values are skipped.
///
/// ```
/// use route_cities::{extract_place_name, GeocodeResponse};
///
/// let response = GeocodeResponse::from_address([("village", "Tesuque"), ("county", "Santa Fe County")]);
/// assert_eq!(extract_place_name(&response), Some("Tesuque".to_string()));
///
/// let response = GeocodeResponse::from_display_name("Gallup, McKinley County, New Mexico");
/// assert_eq!(extract_place_name(&response), Some("Gallup".to_string()));
/// ```
pub fn extract_place_name(response: &GeocodeResponse) -> Option<String> {
    if let Some(address) = &response.address {
        for kind in PLACE_COMPONENTS {
            if let Some(value) = address.get(kind) {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }

    let display = response.display_name.as_deref()?;
    let first = display.split(',').next()?.trim();
    (!first.is_empty()).then(|| first.to_string())
}

/// Canned collaborator for resolver and pipeline tests.
#[cfg(test)]
pub(crate) mod scripted {
    use std::sync::atomic::{AtomicU32, Ordering};

    use parking_lot::Mutex;

    use super::*;

    /// Answers from a fixed table keyed by [`cache_key`](crate::cache_key);
    /// anything else gets `Ok(None)`.
    #[derive(Default)]
    pub(crate) struct ScriptedGeocoder {
        replies: Mutex<HashMap<String, Result<Option<GeocodeResponse>, String>>>,
        calls: AtomicU32,
        yielding: bool,
    }

    impl ScriptedGeocoder {
        pub(crate) fn answer(self, lat: f64, lon: f64, response: GeocodeResponse) -> Self {
            self.replies
                .lock()
                .insert(crate::cache_key(lat, lon), Ok(Some(response)));
            self
        }

        pub(crate) fn fail(self, lat: f64, lon: f64, message: &str) -> Self {
            self.replies
                .lock()
                .insert(crate::cache_key(lat, lon), Err(message.to_string()));
            self
        }

        /// Hand control back to the runtime before answering, the way a
        /// real network call would.
        pub(crate) fn yielding(mut self) -> Self {
            self.yielding = true;
            self
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl ReverseGeocoder for ScriptedGeocoder {
        async fn reverse(
            &self,
            latitude: f64,
            longitude: f64,
        ) -> Result<Option<GeocodeResponse>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.yielding {
                for _ in 0..3 {
                    tokio::task::yield_now().await;
                }
            }
            let key = crate::cache_key(latitude, longitude);
            match self.replies.lock().get(&key) {
                Some(Ok(response)) => Ok(response.clone()),
                Some(Err(message)) => Err(GeocodeError::Transport(message.clone())),
                None => Ok(None),
            }
        }
    }
}
