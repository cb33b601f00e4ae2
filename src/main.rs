use std::sync::Arc;

use inv_core::services::SingleLocationDirectory;
use inv_core::{Engine, EngineConfig};
use inv_shared::database::ConnectionPool;
use inv_shared::AppConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    config.validate().map_err(anyhow::Error::msg)?;

    init_tracing(&config.logging.level, &config.logging.format);

    let db = ConnectionPool::new(config.database_pool_config()).await?;
    let pool = db.pool().clone();

    sqlx::migrate!("./migrations").run(&pool).await?;

    let redis = inv_shared::redis::connect(&config.redis.url).await?;

    // TODO: replace with an adapter backed by the host's real catalog and
    // location tables once that module exists in this deployment.
    let directory = Arc::new(SingleLocationDirectory { location_id: 1 });

    let engine = Engine::new(EngineConfig { pool, redis, directory });

    let dispatcher = engine.dispatcher(config.worker.pool_size, config.worker.poll_interval_ms);
    tokio::spawn(dispatcher.run());

    let app = engine.router();
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(%addr, "starting inventory engine");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
