//! Daemon configuration, read from `ROUTEMAP_*` environment variables.

use anyhow::{anyhow, bail, Context, Result};
use routemap_api_rpc::server::{DEFAULT_RPC_HOST, DEFAULT_RPC_PORT};
use routemap_core::port::MaintenanceConfig;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "~/.routemap/routemap.db";
const DEFAULT_WORKERS: usize = 2;
const DEFAULT_GEOCODER_MIN_INTERVAL_MS: u64 = 1000;
const DEFAULT_GEOCODE_CONCURRENCY: usize = 4;
const DEFAULT_RATE_LIMIT_BURST: u32 = 200;
const DEFAULT_RATE_LIMIT_RATE: u32 = 100;
const DEFAULT_JOB_RETENTION_DAYS: i64 = 7;
const DEFAULT_RECOVERY_GRACE_SECS: u64 = 300;
const RECOVERY_PERIOD: Duration = Duration::from_secs(60);
const MAINTENANCE_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Which halves of the engine this process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// RPC server and workers
    All,
    /// RPC server only; jobs are picked up by worker processes
    Api,
    /// Workers only
    Worker,
}

impl Role {
    pub fn serves_rpc(&self) -> bool {
        matches!(self, Role::All | Role::Api)
    }

    pub fn runs_workers(&self) -> bool {
        matches!(self, Role::All | Role::Worker)
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Role::All),
            "api" => Ok(Role::Api),
            "worker" => Ok(Role::Worker),
            other => bail!("unknown role '{}', expected all|api|worker", other),
        }
    }
}

/// Where resolved ZIP coordinates are memoized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    /// Per-process, lost on restart
    Memory,
    /// Shared by every process on the database
    Sqlite,
}

impl FromStr for CacheBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "sqlite" => Ok(CacheBackend::Sqlite),
            other => bail!("unknown cache backend '{}', expected memory|sqlite", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: String,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub role: Role,
    pub workers: usize,
    pub cache_backend: CacheBackend,
    pub geocoder_url: Option<String>,
    pub geocoder_user_agent: Option<String>,
    pub geocoder_min_interval: Duration,
    pub geocode_concurrency: usize,
    pub rate_limit_burst: u32,
    pub rate_limit_rate: u32,
    pub job_retention_days: i64,
    /// Slack past a RUNNING job's own timeout before it is declared orphaned
    pub recovery_grace: Duration,
    pub recovery_period: Duration,
    pub maintenance_period: Duration,
    pub log_format: LogFormat,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = var("ROUTEMAP_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let db_path = shellexpand::tilde(&db_path).into_owned();

        let workers: usize = parse_or(&var, "ROUTEMAP_WORKERS", DEFAULT_WORKERS)?;
        if workers == 0 {
            bail!("ROUTEMAP_WORKERS must be at least 1");
        }
        let geocode_concurrency: usize = parse_or(
            &var,
            "ROUTEMAP_GEOCODE_CONCURRENCY",
            DEFAULT_GEOCODE_CONCURRENCY,
        )?;
        if geocode_concurrency == 0 {
            bail!("ROUTEMAP_GEOCODE_CONCURRENCY must be at least 1");
        }
        let rate_limit_burst: u32 =
            parse_or(&var, "ROUTEMAP_RATE_LIMIT_BURST", DEFAULT_RATE_LIMIT_BURST)?;
        let rate_limit_rate: u32 =
            parse_or(&var, "ROUTEMAP_RATE_LIMIT_RATE", DEFAULT_RATE_LIMIT_RATE)?;
        if rate_limit_burst == 0 || rate_limit_rate == 0 {
            bail!("RPC rate limits must be at least 1");
        }
        let job_retention_days: i64 = parse_or(
            &var,
            "ROUTEMAP_JOB_RETENTION_DAYS",
            DEFAULT_JOB_RETENTION_DAYS,
        )?;
        if job_retention_days < 0 {
            bail!("ROUTEMAP_JOB_RETENTION_DAYS must not be negative");
        }

        let log_format = match var("ROUTEMAP_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            db_path,
            rpc_host: var("ROUTEMAP_RPC_HOST").unwrap_or_else(|| DEFAULT_RPC_HOST.to_string()),
            rpc_port: parse_or(&var, "ROUTEMAP_RPC_PORT", DEFAULT_RPC_PORT)?,
            role: parse_or(&var, "ROUTEMAP_ROLE", Role::All)?,
            workers,
            cache_backend: parse_or(&var, "ROUTEMAP_CACHE_BACKEND", CacheBackend::Memory)?,
            geocoder_url: var("ROUTEMAP_GEOCODER_URL"),
            geocoder_user_agent: var("ROUTEMAP_GEOCODER_USER_AGENT"),
            geocoder_min_interval: Duration::from_millis(parse_or(
                &var,
                "ROUTEMAP_GEOCODER_MIN_INTERVAL_MS",
                DEFAULT_GEOCODER_MIN_INTERVAL_MS,
            )?),
            geocode_concurrency,
            rate_limit_burst,
            rate_limit_rate,
            job_retention_days,
            recovery_grace: Duration::from_secs(parse_or(
                &var,
                "ROUTEMAP_RECOVERY_GRACE_SECS",
                DEFAULT_RECOVERY_GRACE_SECS,
            )?),
            recovery_period: RECOVERY_PERIOD,
            maintenance_period: MAINTENANCE_PERIOD,
            log_format,
        })
    }

    pub fn maintenance_config(&self) -> MaintenanceConfig {
        MaintenanceConfig {
            job_retention_days: self.job_retention_days,
            ..Default::default()
        }
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{}", e))
            .with_context(|| format!("invalid value '{}' for {}", raw, key)),
    }
}
