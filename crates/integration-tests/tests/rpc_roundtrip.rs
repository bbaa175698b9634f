//! Client-visible flow over JSON-RPC: submit, poll until FINISHED, fetch.

use std::sync::Arc;
use std::time::Duration;

use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::http_client::HttpClientBuilder;
use routemap_api_rpc::types::{ResultResponse, StatusResponse, SubmitResponse};
use routemap_api_rpc::{RpcHandler, RpcServer, RpcServerConfig};
use routemap_core::application::{
    shutdown_channel, spawn_workers, RateLimiter, RouteJobService, RoutePipeline,
};
use routemap_core::domain::{JobStatus, QueueConfig, DEFAULT_QUEUE};
use routemap_core::port::geocoder::mocks::MockGeocoder;
use routemap_core::port::id_provider::UuidProvider;
use routemap_core::port::time_provider::SystemTimeProvider;
use routemap_core::port::{CoordinateCache, JobRepository, MaintenanceConfig, TimeProvider};
use routemap_infra_geo::LeafletRenderer;
use routemap_infra_sqlite::{
    create_pool, run_migrations, SqliteCoordinateCache, SqliteJobRepository, SqliteMaintenance,
};

const SHIPMENTS: &str = "\
95358,25315,3691001
95358,25315,3691001
95358,25315
95358,N3S 7P8,3701001,ca
95358,25315,9990001
";

fn job_params(job_id: &str) -> ObjectParams {
    let mut params = ObjectParams::new();
    params.insert("job_id", job_id).unwrap();
    params
}

#[tokio::test]
async fn test_submit_poll_fetch_over_rpc() {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();

    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let job_repo: Arc<dyn JobRepository> =
        Arc::new(SqliteJobRepository::new(pool.clone(), time_provider.clone()));
    let cache = SqliteCoordinateCache::new(pool.clone());
    cache.seed().await.unwrap();
    let cache: Arc<dyn CoordinateCache> = Arc::new(cache);

    let geocoder = MockGeocoder::new()
        .with("95358", 37.64, -120.99)
        .with("25315", 25.41, -101.00)
        .with("N3S 7P8", 43.14, -80.26);
    let pipeline = Arc::new(RoutePipeline::new(
        Arc::new(geocoder),
        cache.clone(),
        Arc::new(LeafletRenderer::new()),
    ));

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let workers = spawn_workers(
        &QueueConfig::new(DEFAULT_QUEUE, 2),
        job_repo.clone(),
        pipeline,
        time_provider.clone(),
        shutdown_rx,
    );

    let jobs = Arc::new(RouteJobService::new(
        job_repo.clone(),
        Arc::new(UuidProvider),
        time_provider.clone(),
    ));
    let handler = RpcHandler::new(
        jobs,
        job_repo,
        Some(cache),
        Arc::new(SqliteMaintenance::new(pool, time_provider)),
        MaintenanceConfig::default(),
        Arc::new(RateLimiter::new(1000, 1000)),
    );
    let config = RpcServerConfig {
        port: 0,
        ..Default::default()
    };
    let (addr, server) = RpcServer::new(config, handler).start().await.unwrap();
    let client = HttpClientBuilder::default()
        .build(format!("http://{}", addr))
        .unwrap();

    let mut params = ObjectParams::new();
    params.insert("data", SHIPMENTS).unwrap();
    let submitted: SubmitResponse = client.request("route.submit.v1", params).await.unwrap();

    let mut status = JobStatus::Queued;
    for _ in 0..200 {
        let response: StatusResponse = client
            .request("route.status.v1", job_params(&submitted.job_id))
            .await
            .unwrap();
        status = response.status;
        if status == JobStatus::Finished || status == JobStatus::Failed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, JobStatus::Finished);

    let result: ResultResponse = client
        .request("route.result.v1", job_params(&submitted.job_id))
        .await
        .unwrap();
    assert_eq!(result.counts.delivery, 1);
    assert_eq!(result.counts.collection, 1);
    assert_eq!(result.counts.duplicate, 1);
    assert_eq!(result.counts.malformed, 1);
    assert_eq!(result.counts.unclassified, 1);
    assert_eq!(result.map_html.matches(r#"class="route-group""#).count(), 2);
    assert!(result.map_html.contains(r#"data-type="collection""#));

    let unknown: StatusResponse = client
        .request("route.status.v1", job_params("no-such-job"))
        .await
        .unwrap();
    assert_eq!(unknown.status, JobStatus::Unknown);

    shutdown_tx.shutdown();
    for worker in workers {
        worker.await.unwrap();
    }
    server.stop().unwrap();
}
