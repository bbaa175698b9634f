// Route Domain Model

use serde::{Deserialize, Serialize};

/// Geographic point (WGS84 degrees)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Route category, derived from the delivery-id prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteCategory {
    Delivery,
    Collection,
    Stock,
}

impl RouteCategory {
    pub const ALL: [RouteCategory; 3] = [
        RouteCategory::Delivery,
        RouteCategory::Collection,
        RouteCategory::Stock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteCategory::Delivery => "delivery",
            RouteCategory::Collection => "collection",
            RouteCategory::Stock => "stock",
        }
    }
}

impl std::fmt::Display for RouteCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A shipment whose both endpoints have known coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRoute {
    pub origin: Coordinates,
    pub destination: Coordinates,
    pub delivery_id: String,
    pub category: RouteCategory,
}

/// What happened to one input row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RowOutcome {
    Kept { category: RouteCategory },
    /// Fewer than three fields
    Malformed,
    /// Same (origin, destination, delivery id) as an earlier row
    Duplicate,
    Unresolved {
        origin_resolved: bool,
        destination_resolved: bool,
    },
    /// Delivery id matches no category prefix
    Unclassified,
}

/// Audit entry for one input row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowAudit {
    /// 1-based line in the submitted text
    pub line: usize,
    pub delivery_id: Option<String>,
    #[serde(flatten)]
    pub outcome: RowOutcome,
}

/// Aggregate outcome counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteCounts {
    pub delivery: usize,
    pub collection: usize,
    pub stock: usize,
    pub malformed: usize,
    pub duplicate: usize,
    pub unresolved: usize,
    pub unclassified: usize,
}

impl RouteCounts {
    pub fn kept(&self) -> usize {
        self.delivery + self.collection + self.stock
    }
}

/// Per-row audit trail plus the routes that made it onto the map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteReport {
    pub rows: Vec<RowAudit>,
    pub routes: Vec<ResolvedRoute>,
}

impl RouteReport {
    pub fn counts(&self) -> RouteCounts {
        let mut counts = RouteCounts::default();
        for row in &self.rows {
            match &row.outcome {
                RowOutcome::Kept { category } => match category {
                    RouteCategory::Delivery => counts.delivery += 1,
                    RouteCategory::Collection => counts.collection += 1,
                    RouteCategory::Stock => counts.stock += 1,
                },
                RowOutcome::Malformed => counts.malformed += 1,
                RowOutcome::Duplicate => counts.duplicate += 1,
                RowOutcome::Unresolved { .. } => counts.unresolved += 1,
                RowOutcome::Unclassified => counts.unclassified += 1,
            }
        }
        counts
    }

    pub fn routes_in(&self, category: RouteCategory) -> impl Iterator<Item = &ResolvedRoute> {
        self.routes.iter().filter(move |r| r.category == category)
    }
}

/// Pipeline output: rendered map document plus route metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteMapOutput {
    pub map_html: String,
    pub report: RouteReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_outcome() {
        let report = RouteReport {
            rows: vec![
                RowAudit {
                    line: 1,
                    delivery_id: Some("3691001".into()),
                    outcome: RowOutcome::Kept {
                        category: RouteCategory::Delivery,
                    },
                },
                RowAudit {
                    line: 2,
                    delivery_id: Some("3691001".into()),
                    outcome: RowOutcome::Duplicate,
                },
                RowAudit {
                    line: 3,
                    delivery_id: None,
                    outcome: RowOutcome::Malformed,
                },
            ],
            routes: vec![],
        };

        let counts = report.counts();
        assert_eq!(counts.delivery, 1);
        assert_eq!(counts.duplicate, 1);
        assert_eq!(counts.malformed, 1);
        assert_eq!(counts.kept(), 1);
    }

    #[test]
    fn test_row_audit_serializes_flat() {
        let row = RowAudit {
            line: 4,
            delivery_id: Some("99".into()),
            outcome: RowOutcome::Unclassified,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["outcome"], "unclassified");
        assert_eq!(json["line"], 4);
    }
}
