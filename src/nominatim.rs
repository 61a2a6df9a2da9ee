//! Reverse geocoding against an OpenStreetMap Nominatim endpoint.
//!
//! One GET per lookup, no automatic retries: a failed lookup is the
//! resolver's to record as negative. Pacing between calls is also the
//! resolver's job (see [`RateLimit`](crate::RateLimit)); Nominatim's public
//! instance asks for at most one request per second and an identifying
//! `User-Agent`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::GeocodeError;
use crate::geocoder::{GeocodeResponse, ReverseGeocoder};

/// Connection settings for the Nominatim client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NominatimConfig {
    /// Base URL without trailing slash.
    /// Default: "https://nominatim.openstreetmap.org"
    pub base_url: String,

    /// Identifying User-Agent sent with each request.
    /// Default: "route-cities/<version>"
    pub user_agent: String,

    /// Preferred language for returned names.
    /// Default: "en"
    pub language: String,

    /// Whole-request timeout.
    /// Default: 30 seconds
    pub timeout_secs: u64,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("route-cities/", env!("CARGO_PKG_VERSION")).to_string(),
            language: "en".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Nominatim replies `{"error": "..."}` with HTTP 200 when nothing is there.
#[derive(Debug, Deserialize)]
struct ReverseReply {
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    response: GeocodeResponse,
}

/// Reverse geocoder backed by reqwest.
pub struct NominatimClient {
    client: Client,
    config: NominatimConfig,
}

impl NominatimClient {
    pub fn new(config: NominatimConfig) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GeocodeError::Transport(format!("failed to create HTTP client: {}", e)))?;

        info!("[Nominatim] Using {} as {}", config.base_url, config.user_agent);
        Ok(Self { client, config })
    }

    fn reverse_url(&self) -> String {
        format!("{}/reverse", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<GeocodeResponse>, GeocodeError> {
        let start = Instant::now();
        let query = [
            ("format", "jsonv2".to_string()),
            ("lat", format!("{:.6}", latitude)),
            ("lon", format!("{:.6}", longitude)),
            ("accept-language", self.config.language.clone()),
        ];

        let resp = self
            .client
            .get(self.reverse_url())
            .query(&query)
            .send()
            .await
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| GeocodeError::Transport(format!("body download error: {}", e)))?;
        let reply: ReverseReply =
            serde_json::from_slice(&bytes).map_err(|e| GeocodeError::Malformed(e.to_string()))?;

        debug!(
            "[Nominatim] ({:.6}, {:.6}) answered in {:?} ({} bytes)",
            latitude,
            longitude,
            start.elapsed(),
            bytes.len()
        );

        if let Some(message) = reply.error {
            debug!("[Nominatim] No result for ({:.6}, {:.6}): {}", latitude, longitude, message);
            return Ok(None);
        }
        Ok(Some(reply.response))
    }
}
