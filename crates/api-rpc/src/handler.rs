//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method.

use crate::error::{throttled, to_rpc_error};
use crate::types::{
    JobIdRequest, MaintenanceRequest, MaintenanceResponse, ResultResponse, StatsRequest,
    StatsResponse, SubmitRequest, SubmitResponse, StatusResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use routemap_core::application::{RateLimiter, RouteJobService, SubmitRequest as SubmitJob};
use routemap_core::domain::{JobState, JobStatus, DEFAULT_QUEUE};
use routemap_core::port::{CoordinateCache, JobRepository, Maintenance, MaintenanceConfig};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// VACUUM is worth running past this share of free pages
const FRAGMENTATION_VACUUM_THRESHOLD: f64 = 10.0;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    jobs: Arc<RouteJobService>,
    job_repo: Arc<dyn JobRepository>,
    /// The cache the workers read, if this process can see it
    cache: Option<Arc<dyn CoordinateCache>>,
    maintenance: Arc<dyn Maintenance>,
    maintenance_config: MaintenanceConfig,
    rate_limiter: Arc<RateLimiter>,
    start_time: Instant,
}

impl RpcHandler {
    pub fn new(
        jobs: Arc<RouteJobService>,
        job_repo: Arc<dyn JobRepository>,
        cache: Option<Arc<dyn CoordinateCache>>,
        maintenance: Arc<dyn Maintenance>,
        maintenance_config: MaintenanceConfig,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            jobs,
            job_repo,
            cache,
            maintenance,
            maintenance_config,
            rate_limiter,
            start_time: Instant::now(),
        }
    }

    async fn throttle(&self) -> Result<(), ErrorObjectOwned> {
        if self.rate_limiter.check().await {
            Ok(())
        } else {
            Err(throttled())
        }
    }

    /// route.submit.v1
    pub async fn submit(&self, params: SubmitRequest) -> Result<SubmitResponse, ErrorObjectOwned> {
        self.throttle().await?;

        let mut req = SubmitJob::new(params.data);
        req.timeout_secs = params.timeout_secs;

        let job_id = self.jobs.submit(req).await.map_err(to_rpc_error)?;

        Ok(SubmitResponse {
            job_id,
            state: JobStatus::Queued,
        })
    }

    /// route.status.v1
    pub async fn status(&self, params: JobIdRequest) -> Result<StatusResponse, ErrorObjectOwned> {
        self.throttle().await?;

        let status = self
            .jobs
            .poll_status(&params.job_id)
            .await
            .map_err(to_rpc_error)?;

        let error = if status == JobStatus::Failed {
            self.jobs
                .find(&params.job_id)
                .await
                .map_err(to_rpc_error)?
                .and_then(|job| job.error)
        } else {
            None
        };

        Ok(StatusResponse {
            job_id: params.job_id,
            status,
            error,
        })
    }

    /// route.result.v1
    pub async fn result(&self, params: JobIdRequest) -> Result<ResultResponse, ErrorObjectOwned> {
        self.throttle().await?;

        let output = self
            .jobs
            .fetch_result(&params.job_id)
            .await
            .map_err(to_rpc_error)?;

        Ok(ResultResponse {
            job_id: params.job_id,
            map_html: output.map_html,
            counts: output.report.counts(),
            report: output.report,
        })
    }

    /// admin.stats.v1
    pub async fn stats(&self, _params: StatsRequest) -> Result<StatsResponse, ErrorObjectOwned> {
        let count = |state| self.job_repo.count_by_state(DEFAULT_QUEUE, state);

        let queued = count(JobState::Queued).await.map_err(to_rpc_error)?;
        let running = count(JobState::Running).await.map_err(to_rpc_error)?;
        let finished = count(JobState::Finished).await.map_err(to_rpc_error)?;
        let failed = count(JobState::Failed).await.map_err(to_rpc_error)?;

        let cached_zips = match &self.cache {
            Some(cache) => Some(cache.len().await.map_err(to_rpc_error)? as i64),
            None => None,
        };
        let stats = self.maintenance.get_stats().await.map_err(to_rpc_error)?;

        Ok(StatsResponse {
            total_jobs: stats.job_count,
            queued_jobs: queued,
            running_jobs: running,
            finished_jobs: finished,
            failed_jobs: failed,
            cached_zips,
            db_size_bytes: stats.db_size_bytes,
            uptime_seconds: self.start_time.elapsed().as_secs() as i64,
        })
    }

    /// admin.maintenance.v1
    pub async fn maintenance(
        &self,
        params: MaintenanceRequest,
    ) -> Result<MaintenanceResponse, ErrorObjectOwned> {
        let stats_before = self.maintenance.get_stats().await.map_err(to_rpc_error)?;

        let jobs_deleted = self
            .maintenance
            .gc_terminal_jobs(self.maintenance_config.job_retention_days)
            .await
            .map_err(to_rpc_error)?;

        let vacuum_run = params.force_vacuum
            || stats_before.fragmentation_percent > FRAGMENTATION_VACUUM_THRESHOLD
            || stats_before.db_size_mb > self.maintenance_config.max_db_size_mb;
        if vacuum_run {
            self.maintenance.vacuum().await.map_err(to_rpc_error)?;
        }

        let stats_after = self.maintenance.get_stats().await.map_err(to_rpc_error)?;

        info!(jobs_deleted, vacuum_run, "Manual maintenance completed");

        Ok(MaintenanceResponse {
            vacuum_run,
            jobs_deleted,
            db_size_before: stats_before.db_size_bytes,
            db_size_after: stats_after.db_size_bytes,
        })
    }
}
