use redis::aio::ConnectionManager;
use tracing::info;

use crate::error::{Error, Result};

/// Opens a Redis connection manager. `ConnectionManager` transparently
/// reconnects on the next command after a dropped connection, so callers
/// can hold a single clone for the lifetime of the process.
pub async fn connect(redis_url: &str) -> Result<ConnectionManager> {
    info!("connecting to redis");
    let client = redis::Client::open(redis_url).map_err(Error::Redis)?;
    let manager = ConnectionManager::new(client).await.map_err(Error::Redis)?;
    Ok(manager)
}
