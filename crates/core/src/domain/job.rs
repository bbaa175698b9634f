// Job Domain Model

use crate::domain::error::{DomainError, Result};
use crate::domain::route::{RouteMapOutput, RouteReport};
use serde::{Deserialize, Serialize};

/// Job ID (UUID v4)
pub type JobId = String;

/// Persisted job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Running,
    Finished,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "QUEUED",
            JobState::Running => "RUNNING",
            JobState::Finished => "FINISHED",
            JobState::Failed => "FAILED",
        }
    }

    /// Parse the stored column value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "QUEUED" => Some(JobState::Queued),
            "RUNNING" => Some(JobState::Running),
            "FINISHED" => Some(JobState::Finished),
            "FAILED" => Some(JobState::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Finished | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status reported to pollers. `Unknown` covers ids that never existed
/// or were removed by maintenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    Finished,
    Failed,
    Unknown,
}

impl From<Option<JobState>> for JobStatus {
    fn from(state: Option<JobState>) -> Self {
        match state {
            Some(JobState::Queued) => JobStatus::Queued,
            Some(JobState::Running) => JobStatus::Running,
            Some(JobState::Finished) => JobStatus::Finished,
            Some(JobState::Failed) => JobStatus::Failed,
            None => JobStatus::Unknown,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Unknown => f.write_str("UNKNOWN"),
            JobStatus::Queued => f.write_str("QUEUED"),
            JobStatus::Running => f.write_str("RUNNING"),
            JobStatus::Finished => f.write_str("FINISHED"),
            JobStatus::Failed => f.write_str("FAILED"),
        }
    }
}

/// Raw shipment text submitted by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload(String);

impl JobPayload {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self(raw_text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Job Entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub queue: String,
    pub state: JobState,

    pub created_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,

    pub payload: JobPayload,

    /// Wall-clock budget for one run, enforced by the worker
    pub timeout_ms: i64,

    // Result slot (FINISHED only)
    pub result: Option<String>,
    pub report: Option<RouteReport>,

    // Failure reason (FAILED only)
    pub error: Option<String>,
}

impl Job {
    /// Create a new Job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `queue` - Queue name
    /// * `payload` - Raw shipment text
    /// * `timeout_ms` - Job-level timeout
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        queue: impl Into<String>,
        payload: JobPayload,
        timeout_ms: i64,
    ) -> Self {
        Self {
            id: id.into(),
            queue: queue.into(),
            state: JobState::Queued,
            created_at,
            started_at: None,
            finished_at: None,
            payload,
            timeout_ms,
            result: None,
            report: None,
            error: None,
        }
    }

    /// Create a job with deterministic ID and timestamp (tests only).
    ///
    /// IDs are `test-1`, `test-2`, ...; timestamps step by 1000.
    pub fn new_test(queue: impl Into<String>, raw_text: impl Into<String>) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        Self::new(
            format!("test-{}", counter),
            (counter * 1000) as i64,
            queue,
            JobPayload::new(raw_text),
            60_000,
        )
    }

    /// Transition to Running state with explicit timestamp
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        if self.state != JobState::Queued {
            return Err(self.invalid_transition(JobState::Running));
        }
        self.state = JobState::Running;
        self.started_at = Some(now_millis);
        Ok(())
    }

    /// Transition to Finished, filling the result slot
    pub fn finish(&mut self, now_millis: i64, output: RouteMapOutput) -> Result<()> {
        if self.state != JobState::Running {
            return Err(self.invalid_transition(JobState::Finished));
        }
        self.state = JobState::Finished;
        self.finished_at = Some(now_millis);
        self.result = Some(output.map_html);
        self.report = Some(output.report);
        self.error = None;
        Ok(())
    }

    /// Transition to Failed. Partial results are never kept.
    pub fn fail(&mut self, now_millis: i64, reason: impl Into<String>) -> Result<()> {
        if self.state.is_terminal() {
            return Err(self.invalid_transition(JobState::Failed));
        }
        self.state = JobState::Failed;
        self.finished_at = Some(now_millis);
        self.result = None;
        self.report = None;
        self.error = Some(reason.into());
        Ok(())
    }

    pub fn status(&self) -> JobStatus {
        JobStatus::from(Some(self.state))
    }

    fn invalid_transition(&self, to: JobState) -> DomainError {
        DomainError::InvalidStateTransition {
            from: self.state,
            to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output() -> RouteMapOutput {
        RouteMapOutput {
            map_html: "<html></html>".to_string(),
            report: RouteReport::default(),
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut job = Job::new_test("default", "95358,25315,3691001");
        assert_eq!(job.state, JobState::Queued);

        job.start(10).unwrap();
        assert_eq!(job.state, JobState::Running);
        assert_eq!(job.started_at, Some(10));

        job.finish(20, output()).unwrap();
        assert_eq!(job.status(), JobStatus::Finished);
        assert_eq!(job.result.as_deref(), Some("<html></html>"));
        assert_eq!(job.finished_at, Some(20));
    }

    #[test]
    fn test_cannot_finish_queued_job() {
        let mut job = Job::new_test("default", "");
        assert!(job.finish(5, output()).is_err());
    }

    #[test]
    fn test_fail_is_terminal() {
        let mut job = Job::new_test("default", "");
        job.start(1).unwrap();
        job.fail(2, "boom").unwrap();

        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error.as_deref(), Some("boom"));
        assert!(job.result.is_none());
        assert_eq!(
            job.fail(3, "again"),
            Err(DomainError::InvalidStateTransition {
                from: JobState::Failed,
                to: JobState::Failed,
            })
        );
        assert!(job.start(3).is_err());
    }

    #[test]
    fn test_status_from_missing_job_is_unknown() {
        assert_eq!(JobStatus::from(None), JobStatus::Unknown);
        assert_eq!(JobStatus::Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn test_state_roundtrips_through_column_text() {
        for state in [
            JobState::Queued,
            JobState::Running,
            JobState::Finished,
            JobState::Failed,
        ] {
            assert_eq!(JobState::parse(state.as_str()), Some(state));
        }
        assert_eq!(JobState::parse("DONE"), None);
    }
}
