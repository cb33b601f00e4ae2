pub mod handlers;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use inv_shared::error::{Error, StockShortfall};
pub type Result<T> = inv_shared::Result<T>;

use handlers::inventory::AppState;
use services::{
    CommandRegistry, DelayedJobQueue, Dispatcher, InventoryLedger, InventoryManager, ReservationEngine,
    TransactionJournal, VariantDirectory,
};

/// Everything the engine needs to wire its router and its background
/// dispatcher. The host application owns the database pool, the Redis
/// connection, and the catalog/location adapter; this crate only consumes
/// them through this struct and the `VariantDirectory` port.
#[derive(Clone)]
pub struct EngineConfig {
    pub pool: PgPool,
    pub redis: ConnectionManager,
    pub directory: Arc<dyn VariantDirectory>,
}

pub struct Engine {
    pub state: Arc<AppState>,
    pub queue: DelayedJobQueue,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let ledger = InventoryLedger::new();
        let journal = TransactionJournal::new();
        let manager = InventoryManager::new(ledger, journal);
        let queue = DelayedJobQueue::new(config.redis);
        let reservations =
            ReservationEngine::new(config.pool.clone(), manager.clone(), queue.clone(), config.directory.clone());

        Self {
            state: Arc::new(AppState { manager, reservations, pool: config.pool, directory: config.directory }),
            queue,
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .merge(handlers::router())
            .with_state(self.state.clone())
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
    }

    /// Builds the dispatcher with the engine's own expiry handler already
    /// registered. The host application spawns the returned future.
    pub fn dispatcher(&self, pool_size: usize, poll_interval_ms: u64) -> Dispatcher {
        let mut registry = CommandRegistry::new();
        registry.register(
            models::job::EXPIRY_COMMAND,
            Arc::new(ExpiryHandler { reservations: self.state.reservations.clone() }),
        );
        Dispatcher::new(self.queue.clone(), registry, pool_size, poll_interval_ms)
    }
}

struct ExpiryHandler {
    reservations: ReservationEngine,
}

#[async_trait::async_trait]
impl services::JobHandler for ExpiryHandler {
    async fn handle(&self, envelope: models::ScheduledJobEnvelope) -> Result<()> {
        let payload: models::ExpiryPayload = serde_json::from_value(envelope.payload)?;
        self.reservations.expire(payload).await
    }
}
