// Route Pipeline
// parse → dedup → resolve → classify → render, for one submission

pub mod classifier;
pub mod parser;
pub mod resolver;

pub use classifier::{ClassificationRule, RouteClassifier, DEFAULT_RULES};
pub use parser::{parse_records, ParsedInput};
pub use resolver::{lookup_country, GeocodingResolver};

use crate::domain::{
    normalize_zip, Coordinates, ResolvedRoute, RouteCategory, RouteMapOutput, RouteReport,
    RowAudit, RowOutcome,
};
use crate::error::Result;
use crate::port::{CoordinateCache, Geocoder, MapRenderer};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

/// Default number of concurrent geocoding lookups per job
pub const DEFAULT_GEOCODE_CONCURRENCY: usize = 4;

pub struct RoutePipeline {
    resolver: GeocodingResolver,
    classifier: RouteClassifier,
    renderer: Arc<dyn MapRenderer>,
    concurrency: usize,
}

impl RoutePipeline {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        cache: Arc<dyn CoordinateCache>,
        renderer: Arc<dyn MapRenderer>,
    ) -> Self {
        Self {
            resolver: GeocodingResolver::new(geocoder, cache),
            classifier: RouteClassifier::default(),
            renderer,
            concurrency: DEFAULT_GEOCODE_CONCURRENCY,
        }
    }

    /// Bound on in-flight lookups (at least 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_classifier(mut self, classifier: RouteClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Turn raw shipment text into a rendered map and its report.
    ///
    /// Only a renderer failure fails the run; bad rows and unresolvable
    /// ZIPs are recorded in the report instead.
    pub async fn run(&self, raw_text: &str) -> Result<RouteMapOutput> {
        let ParsedInput { records, dropped } = parse_records(raw_text)?;

        // One lookup per (ZIP, country); a miss under one country never
        // stands in for a row that asks for another
        let mut lookups: Vec<(String, String)> = Vec::new();
        let mut seen = HashSet::new();
        for record in &records {
            for (zip, hint) in [
                (&record.origin_zip, &record.origin_country_hint),
                (&record.dest_zip, &record.dest_country_hint),
            ] {
                let key = lookup_key(zip, hint.as_deref());
                if seen.insert(key.clone()) {
                    lookups.push(key);
                }
            }
        }

        let resolved: HashMap<(String, String), Option<Coordinates>> = stream::iter(lookups)
            .map(|(zip, country)| async move {
                let coords = self.resolver.resolve(&zip, Some(country.as_str())).await;
                ((zip, country), coords)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let lookup = |zip: &str, hint: Option<&str>| {
            resolved.get(&lookup_key(zip, hint)).copied().flatten()
        };

        let mut report = RouteReport {
            rows: dropped,
            routes: Vec::new(),
        };

        for record in records {
            let origin = lookup(&record.origin_zip, record.origin_country_hint.as_deref());
            let destination = lookup(&record.dest_zip, record.dest_country_hint.as_deref());

            let outcome = match (origin, destination) {
                (Some(origin), Some(destination)) => {
                    match self.classifier.classify(&record.delivery_id) {
                        Some(category) => {
                            report.routes.push(ResolvedRoute {
                                origin,
                                destination,
                                delivery_id: record.delivery_id.clone(),
                                category,
                            });
                            RowOutcome::Kept { category }
                        }
                        None => RowOutcome::Unclassified,
                    }
                }
                (origin, destination) => RowOutcome::Unresolved {
                    origin_resolved: origin.is_some(),
                    destination_resolved: destination.is_some(),
                },
            };

            report.rows.push(RowAudit {
                line: record.line,
                delivery_id: Some(record.delivery_id),
                outcome,
            });
        }

        report.rows.sort_by_key(|row| row.line);

        let grouped: Vec<ResolvedRoute> = RouteCategory::ALL
            .iter()
            .flat_map(|category| report.routes_in(*category).cloned())
            .collect();
        let map_html = self.renderer.render(&grouped)?;

        let counts = report.counts();
        info!(
            rows = report.rows.len(),
            delivery = counts.delivery,
            collection = counts.collection,
            stock = counts.stock,
            unresolved = counts.unresolved,
            unclassified = counts.unclassified,
            duplicate = counts.duplicate,
            malformed = counts.malformed,
            "Route map rendered"
        );

        Ok(RouteMapOutput { map_html, report })
    }
}

fn lookup_key(zip: &str, hint: Option<&str>) -> (String, String) {
    let zip = normalize_zip(zip);
    let country = lookup_country(&zip, hint);
    (zip, country)
}
