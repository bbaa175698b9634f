// Route Job Service - submit / poll / fetch

pub mod submit;

#[cfg(test)]
mod submit_test;

pub use submit::SubmitRequest;

use crate::domain::{Job, JobId, JobState, JobStatus, RouteMapOutput};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobRepository, TimeProvider};
use std::sync::Arc;

pub struct RouteJobService {
    job_repo: Arc<dyn JobRepository>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl RouteJobService {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            job_repo,
            id_provider,
            time_provider,
        }
    }

    /// Persist a new QUEUED job and return its id
    pub async fn submit(&self, req: SubmitRequest) -> Result<JobId> {
        submit::execute(
            self.job_repo.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            req,
        )
        .await
    }

    /// Current status; unknown and garbage-collected ids report `Unknown`
    pub async fn poll_status(&self, job_id: &JobId) -> Result<JobStatus> {
        let state = self.job_repo.find_state(job_id).await?;
        Ok(JobStatus::from(state))
    }

    pub async fn find(&self, job_id: &JobId) -> Result<Option<Job>> {
        self.job_repo.find_by_id(job_id).await
    }

    /// Rendered map and report of a FINISHED job
    pub async fn fetch_result(&self, job_id: &JobId) -> Result<RouteMapOutput> {
        let job = self
            .job_repo
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;

        match (job.state, job.result, job.report) {
            (JobState::Finished, Some(map_html), Some(report)) => {
                Ok(RouteMapOutput { map_html, report })
            }
            (JobState::Finished, _, _) => Err(AppError::Internal(format!(
                "Job {} finished without a result",
                job_id
            ))),
            (state, _, _) => Err(AppError::InvalidState(format!(
                "Job {} is {}, result not available",
                job_id, state
            ))),
        }
    }
}
