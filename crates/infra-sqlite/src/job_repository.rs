// SQLite JobRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use routemap_core::domain::{Job, JobId, JobPayload, JobState, RouteReport};
use routemap_core::error::{AppError, Result};
use routemap_core::port::{JobRepository, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct SqliteJobRepository {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

fn encode_report(report: Option<&RouteReport>) -> Result<Option<String>> {
    report
        .map(serde_json::to_string)
        .transpose()
        .map_err(AppError::from)
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &Job) -> Result<()> {
        let report = encode_report(job.report.as_ref())?;

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, queue, state, created_at, started_at, finished_at,
                payload, timeout_ms, result, report, error
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.queue)
        .bind(job.state.as_str())
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(job.payload.as_str())
        .bind(job.timeout_ms)
        .bind(&job.result)
        .bind(&report)
        .bind(&job.error)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn find_state(&self, id: &JobId) -> Result<Option<JobState>> {
        let state: Option<String> = sqlx::query_scalar("SELECT state FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        state.map(|s| parse_state(&s)).transpose()
    }

    async fn update(&self, job: &Job) -> Result<bool> {
        let report = encode_report(job.report.as_ref())?;

        // Guarded on the stored state: whoever settles a RUNNING job first wins
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, started_at = ?, finished_at = ?,
                result = ?, report = ?, error = ?
            WHERE id = ? AND state = ?
            "#,
        )
        .bind(job.state.as_str())
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(&job.result)
        .bind(&report)
        .bind(&job.error)
        .bind(&job.id)
        .bind(JobState::Running.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn pop_next(&self, queue: &str) -> Result<Option<Job>> {
        // Single statement: two workers can never claim the same row
        let now = self.time_provider.now_millis();

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET state = ?, started_at = ?
            WHERE id = (
                SELECT id FROM jobs
                WHERE queue = ? AND state = ?
                ORDER BY created_at ASC, id ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(JobState::Running.as_str())
        .bind(now)
        .bind(queue)
        .bind(JobState::Queued.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn count_by_state(&self, queue: &str, state: JobState) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE queue = ? AND state = ?")
                .bind(queue)
                .bind(state.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(count)
    }

    async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            WHERE state = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }
}

fn parse_state(s: &str) -> Result<JobState> {
    JobState::parse(s).ok_or_else(|| AppError::Database(format!("Unknown job state: {}", s)))
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    queue: String,
    state: String,
    created_at: i64,
    started_at: Option<i64>,
    finished_at: Option<i64>,
    payload: String,
    timeout_ms: i64,
    result: Option<String>,
    report: Option<String>,
    error: Option<String>,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let report = self
            .report
            .as_deref()
            .map(serde_json::from_str::<RouteReport>)
            .transpose()?;

        Ok(Job {
            id: self.id,
            queue: self.queue,
            state: parse_state(&self.state)?,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            payload: JobPayload::new(self.payload),
            timeout_ms: self.timeout_ms,
            result: self.result,
            report,
            error: self.error,
        })
    }
}
