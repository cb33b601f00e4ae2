use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Process-wide configuration. Every field is overridable via environment
/// variable with the `APP__` prefix and `__` as the nesting separator, e.g.
/// `APP__DATABASE__MAX_CONNECTIONS=50`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub worker: WorkerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: u64, // seconds
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64, // seconds
    pub idle_timeout: Option<u64>,
    pub max_lifetime: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub connection_timeout: u64, // seconds
}

/// Worker pool sizing. `pool_size` is the only setting the engine itself
/// reads from the environment, via `WORKER_POOL_SIZE` — everything else on
/// this struct is operational plumbing consumed by the binary, not the
/// engine crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub pool_size: usize,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // json, pretty
}

impl AppConfig {
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.request_timeout", 30)?
            .set_default("database.url", "")?
            .set_default("database.max_connections", 20)?
            .set_default("database.min_connections", 1)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("database.idle_timeout", 600)?
            .set_default("database.max_lifetime", 1800)?
            .set_default("redis.url", "")?
            .set_default("redis.connection_timeout", 5)?
            .set_default("worker.pool_size", 5)?
            .set_default("worker.poll_interval_ms", 500)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mut app_config: Self = config.try_deserialize()?;

        // DATABASE_URL, REDIS_URL and WORKER_POOL_SIZE are the bare, unprefixed
        // names every operator expects; they win over the APP__* namespace.
        if let Ok(url) = std::env::var("DATABASE_URL") {
            app_config.database.url = url;
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            app_config.redis.url = url;
        }
        if let Ok(size) = std::env::var("WORKER_POOL_SIZE") {
            app_config.worker.pool_size = size
                .parse()
                .map_err(|_| ConfigError::Message("WORKER_POOL_SIZE must be a positive integer".into()))?;
        }

        Ok(app_config)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.server.port == 0 {
            return Err("server port cannot be 0".to_string());
        }
        if self.database.url.is_empty() {
            return Err("database url cannot be empty".to_string());
        }
        if self.redis.url.is_empty() {
            return Err("redis url cannot be empty".to_string());
        }
        if self.database.max_connections < self.database.min_connections {
            return Err("max connections must be >= min connections".to_string());
        }
        if self.worker.pool_size == 0 {
            return Err("worker pool size must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn database_pool_config(&self) -> crate::database::DatabaseConnectionConfig {
        crate::database::DatabaseConnectionConfig {
            database_url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            min_connections: self.database.min_connections,
            acquire_timeout: Duration::from_secs(self.database.acquire_timeout),
            idle_timeout: self.database.idle_timeout.map(Duration::from_secs),
            max_lifetime: self.database.max_lifetime.map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_database_url() {
        let config = AppConfig {
            server: ServerConfig { host: "0.0.0.0".into(), port: 8080, request_timeout: 30 },
            database: DatabaseConfig {
                url: "".into(),
                max_connections: 20,
                min_connections: 1,
                acquire_timeout: 30,
                idle_timeout: None,
                max_lifetime: None,
            },
            redis: RedisConfig { url: "redis://localhost".into(), connection_timeout: 5 },
            worker: WorkerConfig { pool_size: 5, poll_interval_ms: 500 },
            logging: LoggingConfig { level: "info".into(), format: "pretty".into() },
        };
        assert!(config.validate().is_err());
    }
}
