// Route Map Infrastructure - Geo Adapters
// Implements: Geocoder (Nominatim over HTTP), MapRenderer (Leaflet HTML)

mod leaflet;
mod nominatim;

pub use leaflet::LeafletRenderer;
pub use nominatim::{NominatimConfig, NominatimGeocoder};
