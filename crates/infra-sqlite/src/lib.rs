// Route Map Infrastructure - SQLite Adapter
// Implements: JobRepository, CoordinateCache, Maintenance

mod connection;
mod coordinate_cache;
mod error;
mod job_repository;
mod maintenance_impl;
mod migration;

pub use connection::create_pool;
pub use coordinate_cache::SqliteCoordinateCache;
pub use job_repository::SqliteJobRepository;
pub use maintenance_impl::SqliteMaintenance;
pub use migration::{run_migrations, SCHEMA_VERSION};

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
