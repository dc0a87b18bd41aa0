use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod middleware;
mod modules;
mod routes;
mod state;
mod workers;

use crate::config::settings::AppConfig;
use crate::infrastructure::compute::ecs::EcsComputePlatform;
use crate::infrastructure::db::pool::connect_to_db;
use crate::infrastructure::queue::job_queue::RabbitJobQueue;
use crate::infrastructure::queue::rabbitmq::RabbitMqService;
use crate::infrastructure::redis::client::RedisService;
use crate::infrastructure::redis::counter::RedisAdmissionCounter;
use crate::infrastructure::redis::overflow::RedisOverflowQueue;
use crate::infrastructure::redis::status_sink::RedisStatusSink;
use crate::infrastructure::storage::s3::StorageService;
use crate::modules::dispatch::scheduler::SchedulerState;
use crate::modules::jobs::repository::JobRepository;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("transcode_dispatch=info,tower_http=info")),
        )
        .init();

    info!("Starting transcode dispatcher...");

    let config = AppConfig::new()?;

    let db = connect_to_db(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("failed to run migrations")?;

    let redis = RedisService::new(&config.redis_url)
        .await
        .context("failed to connect to Redis")?;
    let mq = RabbitMqService::new(&config.amqp_url).await?;
    mq.declare_queue(&config.job_queue_name).await?;
    mq.declare_queue(&config.status_queue_name).await?;

    let storage = StorageService::new(
        &config.aws_region,
        config.s3_endpoint.as_deref(),
        &config.aws_access_key,
        &config.aws_secret_key,
    )
    .await;
    let compute = EcsComputePlatform::new(&config);

    let settings = Arc::new(config.scheduler_settings());
    let scheduler = SchedulerState {
        counter: Arc::new(RedisAdmissionCounter::new(redis.clone(), settings.max_concurrent)),
        overflow: Arc::new(RedisOverflowQueue::new(redis.clone())),
        queue: Arc::new(RabbitJobQueue::new(
            mq.clone(),
            redis.clone(),
            &config.job_queue_name,
            settings.dedup_window,
        )
        .await?),
        jobs: Arc::new(JobRepository::new(db)),
        compute: Arc::new(compute),
        artifacts: Arc::new(storage),
        sink: Arc::new(RedisStatusSink::new(redis)),
        settings,
    };

    tokio::spawn(workers::dispatcher::start_dispatcher_worker(
        scheduler.clone(),
        config.poll_interval(),
        config.receive_batch_size,
    ));
    tokio::spawn(workers::status_consumer::start_status_consumer(
        mq,
        scheduler.clone(),
        config.status_queue_name.clone(),
    ));
    tokio::spawn(workers::reconciler::start_reconciler(
        scheduler.clone(),
        config.reconcile_interval(),
    ));

    let addr = format!("0.0.0.0:{}", config.server_port);
    let state = AppState::new(config, scheduler);
    let app = app::create_app(state).await;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
