// Maintenance Scheduler
// Periodic job GC and VACUUM

use crate::error::Result;
use crate::port::{Maintenance, MaintenanceConfig, MaintenanceStats};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::application::worker::ShutdownToken;

/// Runs full maintenance (GC of expired terminal jobs, VACUUM when the
/// database grew too large) on a fixed interval.
pub struct MaintenanceScheduler {
    maintenance: Arc<dyn Maintenance>,
    config: MaintenanceConfig,
    period: Duration,
}

impl MaintenanceScheduler {
    /// # Arguments
    /// * `maintenance` - Maintenance implementation
    /// * `config` - Maintenance configuration
    /// * `period` - How often to run maintenance
    pub fn new(
        maintenance: Arc<dyn Maintenance>,
        config: MaintenanceConfig,
        period: Duration,
    ) -> Self {
        Self {
            maintenance,
            config,
            period,
        }
    }

    /// Maintenance loop; the first pass runs immediately.
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            period_secs = self.period.as_secs(),
            retention_days = self.config.job_retention_days,
            "Maintenance scheduler started"
        );

        let mut tick = interval(self.period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = shutdown.wait() => break,
            }
            if shutdown.is_shutdown() {
                break;
            }

            match self.run_now().await {
                Ok(stats) => {
                    info!(
                        db_size_mb = stats.db_size_mb,
                        job_count = stats.job_count,
                        terminal_jobs = stats.terminal_job_count,
                        cached_zips = stats.cached_zip_count,
                        "Scheduled maintenance completed"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Scheduled maintenance failed");
                }
            }
        }

        info!("Maintenance scheduler stopped");
    }

    /// Run maintenance immediately (for manual trigger)
    pub async fn run_now(&self) -> Result<MaintenanceStats> {
        self.maintenance.run_full_maintenance(&self.config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::worker::shutdown_channel;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingMaintenance {
        gc_calls: AtomicUsize,
        vacuum_calls: AtomicUsize,
        retention_seen: AtomicI64,
        db_size_mb: f64,
    }

    #[async_trait]
    impl Maintenance for CountingMaintenance {
        async fn vacuum(&self) -> Result<f64> {
            self.vacuum_calls.fetch_add(1, Ordering::SeqCst);
            Ok(1.0)
        }

        async fn gc_terminal_jobs(&self, retention_days: i64) -> Result<i64> {
            self.gc_calls.fetch_add(1, Ordering::SeqCst);
            self.retention_seen.store(retention_days, Ordering::SeqCst);
            Ok(0)
        }

        async fn get_stats(&self) -> Result<MaintenanceStats> {
            Ok(MaintenanceStats {
                db_size_mb: self.db_size_mb,
                db_size_bytes: (self.db_size_mb * 1024.0 * 1024.0) as i64,
                job_count: 0,
                terminal_job_count: 0,
                cached_zip_count: 1,
                fragmentation_percent: 0.0,
            })
        }
    }

    #[tokio::test]
    async fn test_run_now_uses_retention() {
        let maintenance = Arc::new(CountingMaintenance::default());
        let config = MaintenanceConfig {
            job_retention_days: 3,
            max_db_size_mb: 500.0,
        };
        let scheduler =
            MaintenanceScheduler::new(maintenance.clone(), config, Duration::from_secs(3600));

        scheduler.run_now().await.unwrap();

        assert_eq!(maintenance.gc_calls.load(Ordering::SeqCst), 1);
        assert_eq!(maintenance.retention_seen.load(Ordering::SeqCst), 3);
        assert_eq!(maintenance.vacuum_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_vacuum_when_db_too_large() {
        let maintenance = Arc::new(CountingMaintenance {
            db_size_mb: 600.0,
            ..Default::default()
        });
        let scheduler = MaintenanceScheduler::new(
            maintenance.clone(),
            MaintenanceConfig::default(),
            Duration::from_secs(3600),
        );

        scheduler.run_now().await.unwrap();
        assert_eq!(maintenance.vacuum_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_runs_until_shutdown() {
        let maintenance = Arc::new(CountingMaintenance::default());
        let scheduler = MaintenanceScheduler::new(
            maintenance.clone(),
            MaintenanceConfig::default(),
            Duration::from_secs(60),
        );
        let (tx, token) = shutdown_channel();

        let handle = tokio::spawn(scheduler.run(token));
        tokio::time::sleep(Duration::from_secs(150)).await;
        tx.shutdown();
        handle.await.unwrap();

        // ticks at 0s, 60s, 120s
        assert_eq!(maintenance.gc_calls.load(Ordering::SeqCst), 3);
    }
}
