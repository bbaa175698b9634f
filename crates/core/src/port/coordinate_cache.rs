// Coordinate Cache Port
// Normalized ZIP -> coordinates memo. Grows monotonically: no eviction, no TTL,
// and a value never changes once stored.

use crate::domain::Coordinates;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Known corrections loaded into every fresh cache
pub const SEED_COORDINATES: &[(&str, Coordinates)] = &[(
    "25298",
    Coordinates {
        lat: 25.4383,
        lon: -100.9737,
    },
)];

#[async_trait]
pub trait CoordinateCache: Send + Sync {
    async fn get(&self, zip: &str) -> Result<Option<Coordinates>>;

    /// Store coordinates for a ZIP. An existing entry wins.
    async fn put(&self, zip: &str, coords: Coordinates) -> Result<()>;

    /// Number of cached ZIPs
    async fn len(&self) -> Result<usize>;
}

/// Process-lifetime cache shared by every job running in this process
#[derive(Debug, Default)]
pub struct InMemoryCoordinateCache {
    entries: RwLock<HashMap<String, Coordinates>>,
}

impl InMemoryCoordinateCache {
    /// Empty cache (tests)
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache pre-loaded with [`SEED_COORDINATES`]
    pub fn seeded() -> Self {
        let entries = SEED_COORDINATES
            .iter()
            .map(|(zip, coords)| (zip.to_string(), *coords))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }
}

fn poisoned() -> AppError {
    AppError::Internal("coordinate cache lock poisoned".to_string())
}

#[async_trait]
impl CoordinateCache for InMemoryCoordinateCache {
    async fn get(&self, zip: &str) -> Result<Option<Coordinates>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(zip).copied())
    }

    async fn put(&self, zip: &str, coords: Coordinates) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.entry(zip.to_string()).or_insert(coords);
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().map_err(|_| poisoned())?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_seeded_cache_contains_correction() {
        let cache = InMemoryCoordinateCache::seeded();
        let coords = cache.get("25298").await.unwrap().unwrap();
        assert_eq!(coords, Coordinates::new(25.4383, -100.9737));
    }

    #[tokio::test]
    async fn test_first_value_is_stable() {
        let cache = InMemoryCoordinateCache::new();
        cache.put("95358", Coordinates::new(1.0, 2.0)).await.unwrap();
        cache.put("95358", Coordinates::new(9.0, 9.0)).await.unwrap();

        assert_eq!(
            cache.get("95358").await.unwrap(),
            Some(Coordinates::new(1.0, 2.0))
        );
        assert_eq!(cache.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let cache = Arc::new(InMemoryCoordinateCache::new());
        let mut handles = vec![];
        for i in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                for j in 0..50 {
                    let zip = format!("{:05}", j);
                    cache
                        .put(&zip, Coordinates::new(i as f64, j as f64))
                        .await
                        .unwrap();
                    assert!(cache.get(&zip).await.unwrap().is_some());
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(cache.len().await.unwrap(), 50);
    }
}
