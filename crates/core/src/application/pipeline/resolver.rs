// Geocoding Resolver
// Cache first, external service second. Never fails: every problem is
// reported as "unresolved".

use crate::domain::{infer_country, normalize_zip, Coordinates};
use crate::port::{CoordinateCache, Geocoder};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct GeocodingResolver {
    geocoder: Arc<dyn Geocoder>,
    cache: Arc<dyn CoordinateCache>,
}

impl GeocodingResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>, cache: Arc<dyn CoordinateCache>) -> Self {
        Self { geocoder, cache }
    }

    pub fn cache(&self) -> &Arc<dyn CoordinateCache> {
        &self.cache
    }

    /// Resolve a ZIP to coordinates.
    ///
    /// An explicit, non-empty `country_hint` overrides inference. Cached ZIPs
    /// never reach the network, whatever hint they come with.
    pub async fn resolve(&self, zip: &str, country_hint: Option<&str>) -> Option<Coordinates> {
        let zip = normalize_zip(zip);
        if zip.is_empty() {
            return None;
        }

        match self.cache.get(&zip).await {
            Ok(Some(coords)) => {
                debug!(zip = %zip, "Coordinate cache hit");
                return Some(coords);
            }
            Ok(None) => {}
            Err(e) => warn!(zip = %zip, error = %e, "Coordinate cache read failed"),
        }

        let country = lookup_country(&zip, country_hint);

        match self.geocoder.geocode(&zip, &country).await {
            Ok(Some(coords)) => {
                if let Err(e) = self.cache.put(&zip, coords).await {
                    warn!(zip = %zip, error = %e, "Coordinate cache write failed");
                }
                Some(coords)
            }
            Ok(None) => {
                warn!(zip = %zip, country = %country, "Geocoder returned no match");
                None
            }
            Err(e) => {
                warn!(zip = %zip, country = %country, error = %e, "Geocoding failed");
                None
            }
        }
    }
}

/// Country a ZIP is geocoded under: the explicit hint if non-empty,
/// otherwise the inferred one. `zip` must already be normalized.
pub fn lookup_country(zip: &str, country_hint: Option<&str>) -> String {
    match country_hint.map(str::trim).filter(|h| !h.is_empty()) {
        Some(hint) => hint.to_lowercase(),
        None => infer_country(zip).as_str().to_string(),
    }
}
