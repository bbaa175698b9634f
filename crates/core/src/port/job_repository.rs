// Job Repository Port (Interface)

use crate::domain::{Job, JobId, JobState};
use crate::error::Result;
use crate::port::TimeProvider;
use async_trait::async_trait;

/// Durable job queue. The submitting side and the workers only share this.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>>;

    /// Current state only (cheap status polling)
    async fn find_state(&self, id: &JobId) -> Result<Option<JobState>>;

    /// Persist the outcome of a RUNNING job: state, timestamps and result slot.
    ///
    /// Returns `false` and writes nothing when the stored job is no longer
    /// RUNNING (already settled by recovery, or collected). A terminal state
    /// is never overwritten.
    async fn update(&self, job: &Job) -> Result<bool>;

    /// Atomically claim the oldest QUEUED job of a queue and mark it RUNNING
    async fn pop_next(&self, queue: &str) -> Result<Option<Job>>;

    /// Count jobs by state
    async fn count_by_state(&self, queue: &str, state: JobState) -> Result<i64>;

    /// Find all jobs by state (for recovery)
    async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::port::time_provider::SystemTimeProvider;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// HashMap-backed repository with the same claim semantics as SQLite
    pub struct InMemoryJobRepository {
        jobs: Mutex<HashMap<JobId, Job>>,
        time_provider: Arc<dyn TimeProvider>,
    }

    impl InMemoryJobRepository {
        pub fn new() -> Self {
            Self::with_time_provider(Arc::new(SystemTimeProvider))
        }

        /// Claims are stamped with `time_provider`, like the SQLite adapter
        pub fn with_time_provider(time_provider: Arc<dyn TimeProvider>) -> Self {
            Self {
                jobs: Mutex::new(HashMap::new()),
                time_provider,
            }
        }

        /// Drop a job, as retention GC would
        pub fn remove(&self, id: &JobId) -> Option<Job> {
            self.jobs.lock().unwrap().remove(id)
        }
    }

    impl Default for InMemoryJobRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl JobRepository for InMemoryJobRepository {
        async fn insert(&self, job: &Job) -> Result<()> {
            self.jobs.lock().unwrap().insert(job.id.clone(), job.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
            Ok(self.jobs.lock().unwrap().get(id).cloned())
        }

        async fn find_state(&self, id: &JobId) -> Result<Option<JobState>> {
            Ok(self.jobs.lock().unwrap().get(id).map(|j| j.state))
        }

        async fn update(&self, job: &Job) -> Result<bool> {
            let mut jobs = self.jobs.lock().unwrap();
            match jobs.get_mut(&job.id) {
                Some(stored) if stored.state == JobState::Running => {
                    *stored = job.clone();
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn pop_next(&self, queue: &str) -> Result<Option<Job>> {
            let now = self.time_provider.now_millis();
            let mut jobs = self.jobs.lock().unwrap();
            let next = jobs
                .values_mut()
                .filter(|j| j.queue == queue && j.state == JobState::Queued)
                .min_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

            match next {
                Some(job) => {
                    job.start(now)?;
                    Ok(Some(job.clone()))
                }
                None => Ok(None),
            }
        }

        async fn count_by_state(&self, queue: &str, state: JobState) -> Result<i64> {
            let jobs = self.jobs.lock().unwrap();
            Ok(jobs
                .values()
                .filter(|j| j.queue == queue && j.state == state)
                .count() as i64)
        }

        async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>> {
            let jobs = self.jobs.lock().unwrap();
            Ok(jobs.values().filter(|j| j.state == state).cloned().collect())
        }
    }
}
