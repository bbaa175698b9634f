// Application Layer - Use Cases and Business Logic

pub mod maintenance;
pub mod pipeline;
pub mod recovery;
pub mod route_job;
pub mod throttle;
pub mod worker;

// Re-exports
pub use maintenance::MaintenanceScheduler;
pub use pipeline::RoutePipeline;
pub use recovery::RecoveryService;
pub use route_job::{RouteJobService, SubmitRequest};
pub use throttle::RateLimiter;
pub use worker::{shutdown_channel, spawn_workers, ShutdownSender, ShutdownToken, Worker};
