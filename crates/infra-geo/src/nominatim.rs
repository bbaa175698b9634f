//! Nominatim geocoding client
//!
//! `GET {base}/search?q=<zip>&countrycodes=<cc>&format=json`, first match
//! wins. Every request waits on a shared [`RateLimiter`] so all jobs in the
//! process together stay within the service's usage policy.

use async_trait::async_trait;
use routemap_core::application::RateLimiter;
use routemap_core::domain::Coordinates;
use routemap_core::port::{GeocodeError, Geocoder};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_USER_AGENT: &str = "RouteMapper/1.0 (routemap@localhost)";
/// One request per second
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1000);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct NominatimConfig {
    pub base_url: String,
    pub user_agent: String,
    pub min_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            min_interval: DEFAULT_MIN_INTERVAL,
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

/// One search hit. Nominatim encodes coordinates as strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

pub struct NominatimGeocoder {
    http_client: reqwest::Client,
    search_url: String,
    rate_limiter: Arc<RateLimiter>,
}

impl NominatimGeocoder {
    pub fn new(config: NominatimConfig) -> Result<Self, GeocodeError> {
        let rate_limiter = Arc::new(RateLimiter::per_interval(config.min_interval));
        Self::with_rate_limiter(config, rate_limiter)
    }

    /// Share a limiter with other clients of the same service
    pub fn with_rate_limiter(
        config: NominatimConfig,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self, GeocodeError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GeocodeError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            search_url: format!("{}/search", config.base_url.trim_end_matches('/')),
            rate_limiter,
        })
    }
}

fn first_match(places: &[Place]) -> Result<Option<Coordinates>, GeocodeError> {
    let Some(place) = places.first() else {
        return Ok(None);
    };

    let lat = place
        .lat
        .trim()
        .parse::<f64>()
        .map_err(|e| GeocodeError::Parse(format!("lat {:?}: {}", place.lat, e)))?;
    let lon = place
        .lon
        .trim()
        .parse::<f64>()
        .map_err(|e| GeocodeError::Parse(format!("lon {:?}: {}", place.lon, e)))?;

    Ok(Some(Coordinates::new(lat, lon)))
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(
        &self,
        zip: &str,
        country: &str,
    ) -> Result<Option<Coordinates>, GeocodeError> {
        self.rate_limiter.acquire().await;

        debug!(zip = %zip, country = %country, "Querying geocoding service");

        let response = self
            .http_client
            .get(&self.search_url)
            .query(&[("q", zip), ("countrycodes", country), ("format", "json")])
            .send()
            .await
            .map_err(|e| GeocodeError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let places: Vec<Place> = response
            .json()
            .await
            .map_err(|e| GeocodeError::Parse(e.to_string()))?;

        first_match(&places)
    }
}
