// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;
pub mod queue;
pub mod route;
pub mod shipment;
pub mod zip;

// Re-exports
pub use error::DomainError;
pub use job::{Job, JobId, JobPayload, JobState, JobStatus};
pub use queue::{QueueConfig, QueueId, DEFAULT_QUEUE};
pub use route::{
    Coordinates, ResolvedRoute, RouteCategory, RouteCounts, RouteMapOutput, RouteReport,
    RowAudit, RowOutcome,
};
pub use shipment::{DedupKey, ShipmentRecord};
pub use zip::{infer_country, normalize_zip, Country};
