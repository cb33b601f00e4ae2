pub mod config;
pub mod database;
pub mod error;
pub mod redis;
pub mod types;

pub use config::AppConfig;
pub use database::{ConnectionPool, DatabaseConnectionConfig, DbPool, DbResult};
pub use error::{Error, Result, StockShortfall};
