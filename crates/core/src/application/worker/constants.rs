// Worker constants (no magic values)
use std::time::Duration;

/// Sleep duration when no jobs are available (100ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(100);

/// Sleep duration after worker error before retry (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Default recovery window for orphaned RUNNING jobs (5 minutes)
pub const DEFAULT_RECOVERY_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Job timeout when the submitter gives none (seconds)
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 20_000;

/// Upper bound for a submitted timeout (24h)
pub const MAX_JOB_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Largest accepted shipment payload (5 MiB)
pub const MAX_PAYLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Queue names are short identifiers
pub const MAX_QUEUE_NAME_LEN: usize = 64;

/// Failure reason recorded by crash recovery
pub const WORKER_CRASHED_REASON: &str = "worker crashed";
