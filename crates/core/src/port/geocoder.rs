// Geocoder Port
// Abstraction over the external ZIP → coordinates lookup service

use crate::domain::Coordinates;
use async_trait::async_trait;
use thiserror::Error;

/// Geocoding adapter errors. The resolver absorbs all of them.
#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Service returned HTTP {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    Parse(String),
}

/// External geocoding service
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Look up a normalized ZIP scoped to a country code.
    ///
    /// Returns `Ok(None)` when the service answered with no match.
    async fn geocode(&self, zip: &str, country: &str)
        -> Result<Option<Coordinates>, GeocodeError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Mock geocoder behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Answer from the lookup table, `None` for unknown ZIPs
        Table,
        /// Every call fails with a network error
        Fail(String),
        /// Panic with message (for panic isolation testing)
        Panic(String),
    }

    /// Table-driven geocoder that records every query
    pub struct MockGeocoder {
        table: HashMap<String, Coordinates>,
        countries: HashMap<String, String>,
        behavior: MockBehavior,
        delay: Option<Duration>,
        queries: Mutex<Vec<(String, String)>>,
    }

    impl MockGeocoder {
        pub fn new() -> Self {
            Self {
                table: HashMap::new(),
                countries: HashMap::new(),
                behavior: MockBehavior::Table,
                delay: None,
                queries: Mutex::new(Vec::new()),
            }
        }

        pub fn with(mut self, zip: &str, lat: f64, lon: f64) -> Self {
            self.table.insert(zip.to_string(), Coordinates::new(lat, lon));
            self
        }

        /// Like `with`, but only matches when queried for `country`
        pub fn with_country(mut self, zip: &str, country: &str, lat: f64, lon: f64) -> Self {
            self.countries.insert(zip.to_string(), country.to_string());
            self.with(zip, lat, lon)
        }

        /// Sleep before answering (timeout testing)
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self {
                behavior: MockBehavior::Fail(message.into()),
                ..Self::new()
            }
        }

        pub fn new_panic_inducing(message: impl Into<String>) -> Self {
            Self {
                behavior: MockBehavior::Panic(message.into()),
                ..Self::new()
            }
        }

        pub fn call_count(&self) -> usize {
            self.queries.lock().unwrap().len()
        }

        /// (zip, country) pairs in call order
        pub fn queries(&self) -> Vec<(String, String)> {
            self.queries.lock().unwrap().clone()
        }
    }

    impl Default for MockGeocoder {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl Geocoder for MockGeocoder {
        async fn geocode(
            &self,
            zip: &str,
            country: &str,
        ) -> Result<Option<Coordinates>, GeocodeError> {
            self.queries
                .lock()
                .unwrap()
                .push((zip.to_string(), country.to_string()));

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            match &self.behavior {
                MockBehavior::Table => match self.countries.get(zip) {
                    Some(only) if only != country => Ok(None),
                    _ => Ok(self.table.get(zip).copied()),
                },
                MockBehavior::Fail(msg) => Err(GeocodeError::Network(msg.clone())),
                MockBehavior::Panic(msg) => panic!("{}", msg),
            }
        }
    }
}
