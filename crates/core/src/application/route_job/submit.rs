// Submit Use Case

use crate::application::worker::constants::{
    DEFAULT_JOB_TIMEOUT_SECS, MAX_JOB_TIMEOUT_SECS, MAX_PAYLOAD_BYTES, MAX_QUEUE_NAME_LEN,
};
use crate::domain::{Job, JobId, JobPayload, DEFAULT_QUEUE};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobRepository, TimeProvider};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Submit request: raw shipment text plus optional execution limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub data: String,

    #[serde(default = "default_queue")]
    pub queue: String,

    /// Job timeout in seconds; `None` uses the default
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_queue() -> String {
    DEFAULT_QUEUE.to_string()
}

impl SubmitRequest {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            queue: default_queue(),
            timeout_secs: None,
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// Reject requests the worker could never run
pub fn validate_request(req: &SubmitRequest) -> Result<()> {
    if req.queue.is_empty() {
        return Err(AppError::Validation("Queue name cannot be empty".into()));
    }
    if req.queue.len() > MAX_QUEUE_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Queue name too long (max {} chars)",
            MAX_QUEUE_NAME_LEN
        )));
    }
    if !req
        .queue
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AppError::Validation(
            "Queue name must be alphanumeric with underscores or hyphens".into(),
        ));
    }

    if req.data.len() > MAX_PAYLOAD_BYTES {
        return Err(AppError::Validation(format!(
            "Payload too large ({} bytes, max {})",
            req.data.len(),
            MAX_PAYLOAD_BYTES
        )));
    }

    if let Some(secs) = req.timeout_secs {
        if secs == 0 || secs > MAX_JOB_TIMEOUT_SECS {
            return Err(AppError::Validation(format!(
                "Timeout out of range (1..={} seconds)",
                MAX_JOB_TIMEOUT_SECS
            )));
        }
    }

    Ok(())
}

/// Validate, then persist a QUEUED job. Never waits for processing.
///
/// # Arguments
///
/// * `job_repo` - Job repository
/// * `id_provider` - ID generator (injected for determinism)
/// * `time_provider` - Time provider (injected for determinism)
/// * `req` - Submit request
pub async fn execute(
    job_repo: &dyn JobRepository,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    req: SubmitRequest,
) -> Result<JobId> {
    validate_request(&req)?;

    let job_id = id_provider.generate_id();
    let created_at = time_provider.now_millis();
    let timeout_ms = (req.timeout_secs.unwrap_or(DEFAULT_JOB_TIMEOUT_SECS) * 1000) as i64;

    let job = Job::new(
        job_id.clone(),
        created_at,
        req.queue,
        JobPayload::new(req.data),
        timeout_ms,
    );

    job_repo.insert(&job).await?;

    info!(
        job_id = %job_id,
        payload_bytes = job.payload.len(),
        timeout_ms,
        "Job submitted"
    );

    Ok(job_id)
}
