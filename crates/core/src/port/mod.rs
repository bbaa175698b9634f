// Port Layer - Interfaces for external dependencies

pub mod coordinate_cache;
pub mod geocoder;
pub mod id_provider; // For deterministic testing
pub mod job_repository;
pub mod maintenance;
pub mod map_renderer;
pub mod time_provider;

// Re-exports
pub use coordinate_cache::{CoordinateCache, InMemoryCoordinateCache, SEED_COORDINATES};
pub use geocoder::{GeocodeError, Geocoder};
pub use id_provider::IdProvider;
pub use job_repository::JobRepository;
pub use maintenance::{Maintenance, MaintenanceConfig, MaintenanceStats};
pub use map_renderer::{MapRenderer, RenderError};
pub use time_provider::TimeProvider;
