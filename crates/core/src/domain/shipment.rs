// Shipment Domain Model

use crate::domain::zip::normalize_zip;

/// One parsed input row. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentRecord {
    /// 1-based line in the submitted text
    pub line: usize,
    pub origin_zip: String,
    pub dest_zip: String,
    pub delivery_id: String,
    pub origin_country_hint: Option<String>,
    pub dest_country_hint: Option<String>,
}

/// Deduplication identity: (normalized origin, normalized destination, delivery id)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub origin_zip: String,
    pub dest_zip: String,
    pub delivery_id: String,
}

impl ShipmentRecord {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            origin_zip: normalize_zip(&self.origin_zip),
            dest_zip: normalize_zip(&self.dest_zip),
            delivery_id: self.delivery_id.clone(),
        }
    }
}
