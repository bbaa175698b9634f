//! Route Map Engine - Main Entry Point
//! JSON-RPC server, route workers and maintenance in one process (by role).

mod config;

use anyhow::{Context, Result};
use config::{CacheBackend, DaemonConfig, LogFormat};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use routemap_api_rpc::{RpcHandler, RpcServer, RpcServerConfig};
use routemap_core::application::{
    shutdown_channel, spawn_workers, MaintenanceScheduler, RateLimiter, RecoveryService,
    RouteJobService, RoutePipeline,
};
use routemap_core::domain::{QueueConfig, DEFAULT_QUEUE};
use routemap_core::port::id_provider::UuidProvider;
use routemap_core::port::time_provider::SystemTimeProvider;
use routemap_core::port::{
    CoordinateCache, InMemoryCoordinateCache, JobRepository, Maintenance, TimeProvider,
};
use routemap_infra_geo::{LeafletRenderer, NominatimConfig, NominatimGeocoder};
use routemap_infra_sqlite::{
    create_pool, run_migrations, SqliteCoordinateCache, SqliteJobRepository, SqliteMaintenance,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn init_logging(format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("routemap=info"))
        .context("Failed to create env filter")?;

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = DaemonConfig::from_env().context("Invalid configuration")?;
    init_logging(config.log_format)?;

    info!(role = ?config.role, "Route Map Engine v{} starting...", VERSION);

    // 1. Database
    if let Some(parent) = Path::new(&config.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    info!(db_path = %config.db_path, "Initializing database...");
    let pool = create_pool(&config.db_path)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 2. Dependencies
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let job_repo: Arc<dyn JobRepository> = Arc::new(SqliteJobRepository::new(
        pool.clone(),
        time_provider.clone(),
    ));
    let maintenance: Arc<dyn Maintenance> =
        Arc::new(SqliteMaintenance::new(pool.clone(), time_provider.clone()));

    let cache: Arc<dyn CoordinateCache> = match config.cache_backend {
        CacheBackend::Memory => Arc::new(InMemoryCoordinateCache::seeded()),
        CacheBackend::Sqlite => {
            let cache = SqliteCoordinateCache::new(pool.clone());
            cache.seed().await.context("Coordinate cache seeding failed")?;
            Arc::new(cache)
        }
    };

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let mut background = Vec::new();

    // 3. Workers
    if config.role.runs_workers() {
        let recovery = RecoveryService::new(
            job_repo.clone(),
            time_provider.clone(),
            Some(config.recovery_grace.as_millis() as i64),
        );
        background.push(tokio::spawn(
            recovery.run(config.recovery_period, shutdown_rx.clone()),
        ));

        let mut geocoder_config = NominatimConfig {
            min_interval: config.geocoder_min_interval,
            ..Default::default()
        };
        if let Some(url) = &config.geocoder_url {
            geocoder_config.base_url = url.clone();
        }
        if let Some(user_agent) = &config.geocoder_user_agent {
            geocoder_config.user_agent = user_agent.clone();
        }
        let geocoder = NominatimGeocoder::new(geocoder_config)
            .context("Geocoder client initialization failed")?;

        let pipeline = Arc::new(
            RoutePipeline::new(Arc::new(geocoder), cache.clone(), Arc::new(LeafletRenderer::new()))
                .with_concurrency(config.geocode_concurrency),
        );

        info!(workers = config.workers, "Starting workers...");
        background.extend(spawn_workers(
            &QueueConfig::new(DEFAULT_QUEUE, config.workers),
            job_repo.clone(),
            pipeline,
            time_provider.clone(),
            shutdown_rx.clone(),
        ));
    }

    // 4. RPC server and maintenance
    let mut rpc_handle = None;
    if config.role.serves_rpc() {
        let jobs = Arc::new(RouteJobService::new(
            job_repo.clone(),
            Arc::new(UuidProvider),
            time_provider.clone(),
        ));
        // An api-only process with a memory cache cannot see the workers' cache
        let worker_cache = (config.role.runs_workers()
            || config.cache_backend == CacheBackend::Sqlite)
            .then(|| cache.clone());
        let handler = RpcHandler::new(
            jobs,
            job_repo.clone(),
            worker_cache,
            maintenance.clone(),
            config.maintenance_config(),
            Arc::new(RateLimiter::new(
                config.rate_limit_burst,
                config.rate_limit_rate,
            )),
        );
        let rpc_config = RpcServerConfig {
            host: config.rpc_host.clone(),
            port: config.rpc_port,
        };
        let (addr, handle) = RpcServer::new(rpc_config, handler)
            .start()
            .await
            .context("RPC server start failed")?;
        info!(addr = %addr, "Accepting route submissions");
        rpc_handle = Some(handle);

        let scheduler = MaintenanceScheduler::new(
            maintenance,
            config.maintenance_config(),
            config.maintenance_period,
        );
        background.push(tokio::spawn(scheduler.run(shutdown_rx.clone())));
    }

    info!("System ready. Press Ctrl+C to shutdown");

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    shutdown_tx.shutdown();
    if let Some(handle) = rpc_handle {
        if let Err(e) = handle.stop() {
            warn!(error = %e, "RPC server already stopped");
        }
    }
    for task in background {
        if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
            warn!("Background task did not stop in time");
        }
    }

    info!("Shutdown complete.");
    Ok(())
}
