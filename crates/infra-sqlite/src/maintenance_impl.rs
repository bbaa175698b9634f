// SQLite Maintenance Implementation
use crate::error::map_sqlx_error;
use async_trait::async_trait;
use routemap_core::domain::JobState;
use routemap_core::error::Result;
use routemap_core::port::{Maintenance, MaintenanceStats, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// SQLite maintenance implementation
pub struct SqliteMaintenance {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteMaintenance {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    async fn pragma(&self, name: &str) -> Result<i64> {
        sqlx::query_scalar(&format!("PRAGMA {}", name))
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    /// DB size in bytes (page_count * page_size)
    async fn get_db_size(&self) -> Result<i64> {
        let page_count = self.pragma("page_count").await?;
        let page_size = self.pragma("page_size").await?;
        Ok(page_count * page_size)
    }
}

fn to_mb(bytes: i64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

#[async_trait]
impl Maintenance for SqliteMaintenance {
    async fn vacuum(&self) -> Result<f64> {
        info!("Running VACUUM to optimize database...");

        let size_before = self.get_db_size().await?;

        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let size_after = self.get_db_size().await?;
        let reclaimed = to_mb(size_before - size_after).max(0.0);

        info!(
            size_before_mb = to_mb(size_before),
            size_after_mb = to_mb(size_after),
            reclaimed_mb = reclaimed,
            "VACUUM completed"
        );

        Ok(reclaimed)
    }

    async fn gc_terminal_jobs(&self, retention_days: i64) -> Result<i64> {
        let now = self.time_provider.now_millis();
        let cutoff_time = now - retention_days * MS_PER_DAY;

        info!(
            retention_days = retention_days,
            cutoff_time = cutoff_time,
            "Running terminal job GC"
        );

        let result = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE state IN (?, ?)
            AND finished_at IS NOT NULL
            AND finished_at < ?
            "#,
        )
        .bind(JobState::Finished.as_str())
        .bind(JobState::Failed.as_str())
        .bind(cutoff_time)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let deleted = result.rows_affected() as i64;
        info!(deleted_jobs = deleted, "Terminal job GC completed");

        Ok(deleted)
    }

    async fn get_stats(&self) -> Result<MaintenanceStats> {
        let db_size_bytes = self.get_db_size().await?;

        let job_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let terminal_job_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE state IN (?, ?)")
                .bind(JobState::Finished.as_str())
                .bind(JobState::Failed.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        let cached_zip_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM zip_coordinates")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let page_count = self.pragma("page_count").await?;
        let freelist_count = self.pragma("freelist_count").await?;
        let fragmentation_percent = if page_count > 0 {
            freelist_count as f64 / page_count as f64 * 100.0
        } else {
            0.0
        };

        Ok(MaintenanceStats {
            db_size_mb: to_mb(db_size_bytes),
            db_size_bytes,
            job_count,
            terminal_job_count,
            cached_zip_count,
            fragmentation_percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations, SqliteJobRepository};
    use routemap_core::domain::Job;
    use routemap_core::port::time_provider::SystemTimeProvider;
    use routemap_core::port::JobRepository;

    async fn setup() -> (SqliteJobRepository, SqliteMaintenance, Arc<dyn TimeProvider>) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
        (
            SqliteJobRepository::new(pool.clone(), time_provider.clone()),
            SqliteMaintenance::new(pool, time_provider.clone()),
            time_provider,
        )
    }

    #[tokio::test]
    async fn test_maintenance_stats() {
        let (_, maintenance, _) = setup().await;

        let stats = maintenance.get_stats().await.unwrap();

        assert!(stats.db_size_mb > 0.0);
        assert_eq!(stats.job_count, 0);
        assert_eq!(stats.terminal_job_count, 0);
        assert_eq!(stats.cached_zip_count, 0);
    }

    #[tokio::test]
    async fn test_vacuum() {
        let (_, maintenance, _) = setup().await;

        // in-memory databases reclaim nothing, but VACUUM must still succeed
        let reclaimed = maintenance.vacuum().await.unwrap();
        assert!(reclaimed >= 0.0);
    }

    #[tokio::test]
    async fn test_gc_removes_only_expired_terminal_jobs() {
        let (repo, maintenance, time_provider) = setup().await;
        let now = time_provider.now_millis();

        let mut expired = Job::new_test("test", "a");
        expired.state = JobState::Finished;
        expired.finished_at = Some(now - 10 * MS_PER_DAY);

        let mut recent = Job::new_test("test", "b");
        recent.state = JobState::Failed;
        recent.finished_at = Some(now - MS_PER_DAY);

        let queued = Job::new_test("test", "c");

        for job in [&expired, &recent, &queued] {
            repo.insert(job).await.unwrap();
        }

        assert_eq!(maintenance.gc_terminal_jobs(7).await.unwrap(), 1);

        assert!(repo.find_by_id(&expired.id).await.unwrap().is_none());
        assert!(repo.find_by_id(&recent.id).await.unwrap().is_some());
        assert!(repo.find_by_id(&queued.id).await.unwrap().is_some());

        let stats = maintenance.get_stats().await.unwrap();
        assert_eq!(stats.job_count, 2);
        assert_eq!(stats.terminal_job_count, 1);
    }
}
