use std::time::Duration;

use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};

use crate::errors::AppError;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;
pub type DbConn = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 100,
            acquire_timeout: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(10),
        }
    }
}

fn builder(settings: PoolSettings) -> diesel::r2d2::Builder<ConnectionManager<PgConnection>> {
    Pool::builder()
        .max_size(settings.max_connections)
        .min_idle(Some(0))
        .connection_timeout(settings.acquire_timeout)
        .idle_timeout(Some(settings.idle_timeout))
        .test_on_check_out(true)
}

/// Builds the pool and opens its first connection eagerly.
pub fn create_pool(database_url: &str, settings: PoolSettings) -> Result<DbPool, AppError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = builder(settings)
        .build(manager)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to create database pool: {e}")))?;

    tracing::info!(
        max_connections = settings.max_connections,
        "database connection pool created"
    );
    Ok(pool)
}

/// Builds the pool without connecting; connections are opened on first use.
pub fn create_lazy_pool(database_url: &str, settings: PoolSettings) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    builder(settings).build_unchecked(manager)
}

/// Checks a connection out of the pool, logging and masking the failure.
pub fn get_conn(pool: &DbPool) -> Result<DbConn, AppError> {
    pool.get().map_err(|e| {
        tracing::error!(error = %e, "failed to get db connection");
        AppError::internal("database connection error")
    })
}
