pub mod connection;

pub use connection::{ConnectionPool, DatabaseConnectionConfig};

use sqlx::{PgPool, Postgres, Transaction};

/// Type alias for the pool type every service depends on.
pub type DbPool = PgPool;

/// Type alias for a transaction handle.
pub type DbTransaction<'a> = Transaction<'a, Postgres>;

/// Database result type.
pub type DbResult<T> = Result<T, sqlx::Error>;
