// Worker - Job execution loop

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::pipeline::RoutePipeline;
use crate::domain::{Job, QueueConfig, RouteMapOutput};
use crate::error::Result;
use crate::port::{JobRepository, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::sleep;
use tracing::{error, info, warn};

/// How one job execution ended
enum Outcome {
    Finished(RouteMapOutput),
    Failed(String),
}

/// Worker processes jobs from a queue
#[derive(Clone)]
pub struct Worker {
    queue: String,
    job_repo: Arc<dyn JobRepository>,
    pipeline: Arc<RoutePipeline>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Worker {
    pub fn new(
        queue: impl Into<String>,
        job_repo: Arc<dyn JobRepository>,
        pipeline: Arc<RoutePipeline>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            queue: queue.into(),
            job_repo,
            pipeline,
            time_provider,
        }
    }

    /// Run worker loop with graceful shutdown support
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!("Worker started for queue: {}", self.queue);
        loop {
            if shutdown.is_shutdown() {
                info!("Worker shutting down for queue: {}", self.queue);
                break;
            }
            match self.process_next_job().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = sleep(IDLE_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!("Worker interrupted during idle");
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!("Worker error: {}", e);
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!("Worker interrupted during error recovery");
                            break;
                        }
                    }
                }
            }
        }
        info!("Worker stopped for queue: {}", self.queue);
        Ok(())
    }

    /// Process next job from queue (returns true if a job was processed)
    pub async fn process_next_job(&self) -> Result<bool> {
        // Pop next job (already atomically set to RUNNING in DB)
        let mut job = match self.job_repo.pop_next(&self.queue).await? {
            Some(j) => j,
            None => return Ok(false),
        };

        info!(
            job_id = %job.id,
            payload_bytes = job.payload.len(),
            timeout_ms = job.timeout_ms,
            "Processing job"
        );

        let outcome = self.execute(&job).await;
        let now = self.time_provider.now_millis();

        match outcome {
            Outcome::Finished(output) => {
                let routes = output.report.routes.len();
                job.finish(now, output)?;
                info!(job_id = %job.id, routes, "Job finished");
            }
            Outcome::Failed(reason) => {
                error!(job_id = %job.id, reason = %reason, "Job failed");
                job.fail(now, reason)?;
            }
        }

        if !self.job_repo.update(&job).await? {
            warn!(
                job_id = %job.id,
                state = job.state.as_str(),
                "Job was settled elsewhere (recovered or collected), result dropped"
            );
        }
        Ok(true)
    }

    /// Run the pipeline in its own task so a panic cannot take the worker
    /// down, bounded by the job timeout. On timeout the task is aborted,
    /// which drops any in-flight geocoding lookups.
    async fn execute(&self, job: &Job) -> Outcome {
        let pipeline = Arc::clone(&self.pipeline);
        let raw_text = job.payload.as_str().to_string();

        let mut handle = tokio::task::spawn(async move { pipeline.run(&raw_text).await });

        let limit = Duration::from_millis(job.timeout_ms.max(0) as u64);
        match tokio::time::timeout(limit, &mut handle).await {
            Ok(Ok(Ok(output))) => Outcome::Finished(output),
            Ok(Ok(Err(e))) => Outcome::Failed(e.to_string()),
            Ok(Err(join_err)) => Outcome::Failed(describe_join_error(&job.id, join_err)),
            Err(_) => {
                handle.abort();
                warn!(job_id = %job.id, timeout_ms = job.timeout_ms, "Job timed out, aborting");
                Outcome::Failed(format!("timed out after {} ms", job.timeout_ms))
            }
        }
    }
}

fn describe_join_error(job_id: &str, join_err: JoinError) -> String {
    if join_err.is_panic() {
        error!(job_id = %job_id, "Job panicked: {:?}", join_err);
        let panic = join_err.into_panic();
        let message = panic
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
            .unwrap_or_else(|| "unknown panic".to_string());
        format!("pipeline panicked: {}", message)
    } else {
        error!(job_id = %job_id, "Job cancelled: {:?}", join_err);
        "pipeline task cancelled".to_string()
    }
}

/// Spawn `config.max_workers` loops on one queue, sharing one pipeline
/// (and therefore one coordinate cache and geocoder rate limiter).
pub fn spawn_workers(
    config: &QueueConfig,
    job_repo: Arc<dyn JobRepository>,
    pipeline: Arc<RoutePipeline>,
    time_provider: Arc<dyn TimeProvider>,
    shutdown: ShutdownToken,
) -> Vec<JoinHandle<()>> {
    (0..config.max_workers)
        .map(|index| {
            let worker = Worker::new(
                config.name.clone(),
                Arc::clone(&job_repo),
                Arc::clone(&pipeline),
                Arc::clone(&time_provider),
            );
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = worker.run(shutdown).await {
                    error!(worker = index, error = %e, "Worker exited with error");
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobState, RouteCategory};
    use crate::port::geocoder::mocks::MockGeocoder;
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::map_renderer::mocks::MockRenderer;
    use crate::port::time_provider::SystemTimeProvider;
    use crate::port::{Geocoder, InMemoryCoordinateCache, MapRenderer};

    const INPUT: &str = "95358,25315,3691001\n95358,25315,3691001\n";

    fn worker(
        repo: Arc<InMemoryJobRepository>,
        geocoder: Arc<dyn Geocoder>,
        renderer: Arc<dyn MapRenderer>,
    ) -> Worker {
        let pipeline = RoutePipeline::new(
            geocoder,
            Arc::new(InMemoryCoordinateCache::new()),
            renderer,
        );
        Worker::new(
            "default",
            repo,
            Arc::new(pipeline),
            Arc::new(SystemTimeProvider),
        )
    }

    fn table_geocoder() -> Arc<dyn Geocoder> {
        Arc::new(
            MockGeocoder::new()
                .with("95358", 37.64, -120.99)
                .with("25315", 25.41, -101.00),
        )
    }

    #[tokio::test]
    async fn test_job_finishes_with_result() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let job = Job::new_test("default", INPUT);
        repo.insert(&job).await.unwrap();

        let worker = worker(repo.clone(), table_geocoder(), Arc::new(MockRenderer::new()));
        assert!(worker.process_next_job().await.unwrap());

        let done = repo.find_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(done.state, JobState::Finished);
        assert!(done.started_at.is_some());
        assert!(done.finished_at.is_some());
        assert!(!done.result.unwrap().is_empty());
        let report = done.report.unwrap();
        assert_eq!(report.routes.len(), 1);
        assert_eq!(report.routes[0].category, RouteCategory::Delivery);
    }

    #[tokio::test]
    async fn test_empty_queue_returns_false() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let worker = worker(repo, table_geocoder(), Arc::new(MockRenderer::new()));
        assert!(!worker.process_next_job().await.unwrap());
    }

    #[tokio::test]
    async fn test_renderer_failure_fails_job() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let job = Job::new_test("default", INPUT);
        repo.insert(&job).await.unwrap();

        let worker = worker(
            repo.clone(),
            table_geocoder(),
            Arc::new(MockRenderer::new_fail("boom")),
        );
        worker.process_next_job().await.unwrap();

        let failed = repo.find_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(failed.state, JobState::Failed);
        assert!(failed.result.is_none());
        assert!(failed.report.is_none());
        assert!(failed.error.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let first = Job::new_test("default", INPUT);
        repo.insert(&first).await.unwrap();

        let worker = worker(
            repo.clone(),
            Arc::new(MockGeocoder::new_panic_inducing("geocoder exploded")),
            Arc::new(MockRenderer::new()),
        );
        assert!(worker.process_next_job().await.unwrap());

        let failed = repo.find_by_id(&first.id).await.unwrap().unwrap();
        assert_eq!(failed.state, JobState::Failed);
        assert!(failed.error.unwrap().contains("geocoder exploded"));

        // the worker keeps serving the queue
        let second = Job::new_test("default", "");
        repo.insert(&second).await.unwrap();
        assert!(worker.process_next_job().await.unwrap());
        assert_eq!(
            repo.find_state(&second.id).await.unwrap(),
            Some(JobState::Finished)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_job() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let mut job = Job::new_test("default", INPUT);
        job.timeout_ms = 1_000;
        repo.insert(&job).await.unwrap();

        let slow: Arc<dyn Geocoder> = Arc::new(
            MockGeocoder::new()
                .with("95358", 37.64, -120.99)
                .with_delay(Duration::from_secs(60)),
        );
        let worker = worker(repo.clone(), slow, Arc::new(MockRenderer::new()));
        worker.process_next_job().await.unwrap();

        let failed = repo.find_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(failed.state, JobState::Failed);
        assert!(failed.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_spawned_workers_drain_queue_and_stop() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let mut ids = Vec::new();
        for _ in 0..5 {
            let job = Job::new_test("default", INPUT);
            ids.push(job.id.clone());
            repo.insert(&job).await.unwrap();
        }

        let pipeline = Arc::new(RoutePipeline::new(
            table_geocoder(),
            Arc::new(InMemoryCoordinateCache::new()),
            Arc::new(MockRenderer::new()),
        ));
        let (tx, token) = shutdown_channel();
        let handles = spawn_workers(
            &QueueConfig::new("default", 3),
            repo.clone(),
            pipeline,
            Arc::new(SystemTimeProvider),
            token,
        );
        assert_eq!(handles.len(), 3);

        for _ in 0..100 {
            if repo.count_by_state("default", JobState::Finished).await.unwrap() == 5 {
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }

        tx.shutdown();
        for handle in handles {
            handle.await.unwrap();
        }

        for id in ids {
            assert_eq!(repo.find_state(&id).await.unwrap(), Some(JobState::Finished));
        }
    }
}
