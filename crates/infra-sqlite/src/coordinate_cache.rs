// SQLite CoordinateCache Implementation
// Shared across every worker process pointed at the same database file

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use routemap_core::domain::Coordinates;
use routemap_core::error::Result;
use routemap_core::port::{CoordinateCache, SEED_COORDINATES};
use sqlx::SqlitePool;
use tracing::debug;

pub struct SqliteCoordinateCache {
    pool: SqlitePool,
}

impl SqliteCoordinateCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load [`SEED_COORDINATES`]; existing rows are left alone
    pub async fn seed(&self) -> Result<()> {
        for (zip, coords) in SEED_COORDINATES {
            self.put(zip, *coords).await?;
        }
        debug!(entries = SEED_COORDINATES.len(), "Coordinate cache seeded");
        Ok(())
    }
}

#[async_trait]
impl CoordinateCache for SqliteCoordinateCache {
    async fn get(&self, zip: &str) -> Result<Option<Coordinates>> {
        let row: Option<(f64, f64)> =
            sqlx::query_as("SELECT lat, lon FROM zip_coordinates WHERE zip = ?")
                .bind(zip)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(row.map(|(lat, lon)| Coordinates::new(lat, lon)))
    }

    async fn put(&self, zip: &str, coords: Coordinates) -> Result<()> {
        // First writer wins, concurrent processes included
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO zip_coordinates (zip, lat, lon, created_at)
            VALUES (?, ?, ?, CAST(strftime('%s', 'now') AS INTEGER) * 1000)
            "#,
        )
        .bind(zip)
        .bind(coords.lat)
        .bind(coords.lon)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM zip_coordinates")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    async fn setup_cache() -> SqliteCoordinateCache {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteCoordinateCache::new(pool)
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = setup_cache().await;
        assert_eq!(cache.get("95358").await.unwrap(), None);

        cache
            .put("95358", Coordinates::new(37.64, -120.99))
            .await
            .unwrap();

        assert_eq!(
            cache.get("95358").await.unwrap(),
            Some(Coordinates::new(37.64, -120.99))
        );
        assert_eq!(cache.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_first_value_is_stable() {
        let cache = setup_cache().await;
        cache.put("95358", Coordinates::new(1.0, 2.0)).await.unwrap();
        cache.put("95358", Coordinates::new(3.0, 4.0)).await.unwrap();

        assert_eq!(
            cache.get("95358").await.unwrap(),
            Some(Coordinates::new(1.0, 2.0))
        );
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let cache = setup_cache().await;
        cache.seed().await.unwrap();
        cache.seed().await.unwrap();

        assert_eq!(cache.len().await.unwrap(), SEED_COORDINATES.len());
        assert_eq!(
            cache.get("25298").await.unwrap(),
            Some(Coordinates::new(25.4383, -100.9737))
        );
    }
}
