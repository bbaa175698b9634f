// Crash recovery
use crate::application::worker::constants::{DEFAULT_RECOVERY_WINDOW_MS, WORKER_CRASHED_REASON};
use crate::application::worker::ShutdownToken;
use crate::domain::JobState;
use crate::port::{JobRepository, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// Crash recovery service
///
/// Fails jobs left RUNNING by a worker that died. A live worker always
/// settles a job within its timeout, so a job is only considered orphaned
/// once `started_at + timeout + grace` has passed. There is no automatic
/// retry: the caller sees FAILED and resubmits.
pub struct RecoveryService {
    job_repo: Arc<dyn JobRepository>,
    time_provider: Arc<dyn TimeProvider>,
    grace_ms: i64,
}

impl RecoveryService {
    /// Create a new recovery service
    ///
    /// # Arguments
    /// * `job_repo` - Job repository
    /// * `time_provider` - Time provider
    /// * `grace_ms` - Optional slack past each job's own timeout (default: 5 minutes)
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        time_provider: Arc<dyn TimeProvider>,
        grace_ms: Option<i64>,
    ) -> Self {
        Self {
            job_repo,
            time_provider,
            grace_ms: grace_ms.unwrap_or(DEFAULT_RECOVERY_WINDOW_MS),
        }
    }

    /// Mark RUNNING jobs with `started_at + timeout + grace < now` as FAILED
    ///
    /// # Returns
    /// Number of jobs recovered
    pub async fn recover_orphaned_jobs(&self) -> crate::error::Result<usize> {
        let now = self.time_provider.now_millis();

        info!(grace_ms = %self.grace_ms, "Starting orphaned job recovery");

        let running_jobs = self.job_repo.find_by_state(JobState::Running).await?;
        let mut recovered_count = 0;

        for mut job in running_jobs {
            match job.started_at {
                Some(started_at) => {
                    let deadline = started_at
                        .saturating_add(job.timeout_ms)
                        .saturating_add(self.grace_ms);
                    if deadline >= now {
                        continue;
                    }
                    info!(
                        job_id = %job.id,
                        started_at = %started_at,
                        deadline = %deadline,
                        "Recovering orphaned job"
                    );
                }
                None => {
                    warn!(job_id = %job.id, "RUNNING job without started_at, marking as FAILED");
                }
            }

            job.fail(now, WORKER_CRASHED_REASON)?;
            if self.job_repo.update(&job).await? {
                recovered_count += 1;
            } else {
                // settled by its worker between the scan and the write
                info!(job_id = %job.id, "Job settled before recovery, skipped");
            }
        }

        info!(recovered_count = %recovered_count, "Orphaned job recovery complete");
        Ok(recovered_count)
    }

    /// Sweep on an interval until shutdown; the first sweep runs immediately.
    pub async fn run(self, period: Duration, mut shutdown: ShutdownToken) {
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = shutdown.wait() => break,
            }
            if shutdown.is_shutdown() {
                break;
            }

            if let Err(e) = self.recover_orphaned_jobs().await {
                error!(error = %e, "Crash recovery failed");
            }
        }

        info!("Recovery sweep stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::worker::shutdown_channel;
    use crate::domain::{Job, RouteMapOutput, RouteReport};
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::time_provider::mocks::ManualTimeProvider;

    fn running_job(started_at: Option<i64>) -> Job {
        let mut job = Job::new_test("default", "95358,25315,3691001");
        job.state = JobState::Running;
        job.started_at = started_at;
        job
    }

    #[tokio::test]
    async fn test_stale_running_jobs_fail() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let clock = Arc::new(ManualTimeProvider::new(10 * 60 * 1000));

        let stale = running_job(Some(0));
        let fresh = running_job(Some(9 * 60 * 1000));
        let broken = running_job(None);
        for job in [&stale, &fresh, &broken] {
            repo.insert(job).await.unwrap();
        }

        let recovery = RecoveryService::new(repo.clone(), clock, None);
        assert_eq!(recovery.recover_orphaned_jobs().await.unwrap(), 2);

        let stale = repo.find_by_id(&stale.id).await.unwrap().unwrap();
        assert_eq!(stale.state, JobState::Failed);
        assert_eq!(stale.error.as_deref(), Some(WORKER_CRASHED_REASON));

        let fresh = repo.find_by_id(&fresh.id).await.unwrap().unwrap();
        assert_eq!(fresh.state, JobState::Running);

        let broken = repo.find_by_id(&broken.id).await.unwrap().unwrap();
        assert_eq!(broken.state, JobState::Failed);
    }

    #[tokio::test]
    async fn test_job_within_its_timeout_is_left_running() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let clock = Arc::new(ManualTimeProvider::new(0));

        let mut long = running_job(Some(0));
        long.timeout_ms = 60 * 60 * 1000;
        repo.insert(&long).await.unwrap();

        // well past the grace, still inside the job's own timeout
        clock.advance(30 * 60 * 1000);
        let recovery = RecoveryService::new(repo.clone(), clock.clone(), None);
        assert_eq!(recovery.recover_orphaned_jobs().await.unwrap(), 0);

        clock.advance(36 * 60 * 1000);
        assert_eq!(recovery.recover_orphaned_jobs().await.unwrap(), 1);
        assert_eq!(
            repo.find_state(&long.id).await.unwrap(),
            Some(JobState::Failed)
        );
    }

    #[tokio::test]
    async fn test_late_worker_write_keeps_failed() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let clock = Arc::new(ManualTimeProvider::new(0));

        let mut claimed = running_job(Some(0));
        repo.insert(&claimed).await.unwrap();

        clock.advance(10 * 60 * 1000);
        let recovery = RecoveryService::new(repo.clone(), clock.clone(), None);
        assert_eq!(recovery.recover_orphaned_jobs().await.unwrap(), 1);

        claimed
            .finish(
                clock.now_millis(),
                RouteMapOutput {
                    map_html: "<html></html>".to_string(),
                    report: RouteReport::default(),
                },
            )
            .unwrap();
        assert!(!repo.update(&claimed).await.unwrap());

        let stored = repo.find_by_id(&claimed.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Failed);
        assert!(stored.result.is_none());
    }

    #[tokio::test]
    async fn test_sweep_stops_on_shutdown() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let clock = Arc::new(ManualTimeProvider::new(10 * 60 * 1000));
        let stale = running_job(Some(0));
        repo.insert(&stale).await.unwrap();

        let (tx, rx) = shutdown_channel();
        let recovery = RecoveryService::new(repo.clone(), clock, None);
        let sweep = tokio::spawn(recovery.run(Duration::from_secs(3600), rx));

        for _ in 0..100 {
            if repo.find_state(&stale.id).await.unwrap() == Some(JobState::Failed) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            repo.find_state(&stale.id).await.unwrap(),
            Some(JobState::Failed)
        );

        tx.shutdown();
        tokio::time::timeout(Duration::from_secs(1), sweep)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_queued_jobs_untouched() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let clock = Arc::new(ManualTimeProvider::new(i64::MAX / 2));

        let queued = Job::new_test("default", "a,b,c");
        repo.insert(&queued).await.unwrap();

        let recovery = RecoveryService::new(repo.clone(), clock, Some(0));
        assert_eq!(recovery.recover_orphaned_jobs().await.unwrap(), 0);
        assert_eq!(
            repo.find_state(&queued.id).await.unwrap(),
            Some(JobState::Queued)
        );
    }
}
