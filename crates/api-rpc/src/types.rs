//! RPC Request/Response Types
//!
//! JSON-RPC method parameters and results.

use routemap_core::domain::{JobStatus, RouteCounts, RouteReport};
use serde::{Deserialize, Serialize};

/// route.submit.v1 - Submit shipment data for rendering
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub data: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub state: JobStatus,
}

/// route.status.v1 / route.result.v1
#[derive(Debug, Deserialize)]
pub struct JobIdRequest {
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    /// Failure reason, FAILED jobs only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultResponse {
    pub job_id: String,
    pub map_html: String,
    pub counts: RouteCounts,
    pub report: RouteReport,
}

/// admin.stats.v1 - Get system statistics
#[derive(Debug, Default, Deserialize)]
pub struct StatsRequest {
    // No parameters needed
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_jobs: i64,
    pub queued_jobs: i64,
    pub running_jobs: i64,
    pub finished_jobs: i64,
    pub failed_jobs: i64,
    /// `None` when the workers' cache lives in another process
    pub cached_zips: Option<i64>,
    pub db_size_bytes: i64,
    pub uptime_seconds: i64,
}

/// admin.maintenance.v1 - Run manual maintenance
#[derive(Debug, Default, Deserialize)]
pub struct MaintenanceRequest {
    #[serde(default)]
    pub force_vacuum: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceResponse {
    pub vacuum_run: bool,
    pub jobs_deleted: i64,
    pub db_size_before: i64,
    pub db_size_after: i64,
}
