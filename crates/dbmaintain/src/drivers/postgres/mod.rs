//! PostgreSQL driver.
//!
//! This module provides PostgreSQL-specific implementations:
//!
//! - [`connect`]: connection pool for the registry, catalog and runner
//! - [`PostgresCatalog`]: catalog access and constraint disabling
//! - [`PostgresScriptRunner`]: direct statement execution

mod catalog;
mod runner;

pub use catalog::PostgresCatalog;
pub use runner::PostgresScriptRunner;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::error::SqlState;
use tokio_postgres::{Config as PgConfig, NoTls};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{MaintainError, Result};

/// Create a pool and check that the database answers.
pub async fn connect(config: &DatabaseConfig) -> Result<Pool> {
    let mut pg_config = PgConfig::new();
    pg_config.host(&config.host);
    pg_config.port(config.port);
    pg_config.dbname(&config.database);
    pg_config.user(&config.user);
    pg_config.password(&config.password);
    pg_config.application_name("dbmaintain");

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };

    let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
    let pool = Pool::builder(mgr)
        .max_size(config.max_connections)
        .build()
        .map_err(|e| MaintainError::pool(e.to_string(), "creating PostgreSQL pool"))?;

    // Test connection
    let client = pool
        .get()
        .await
        .map_err(|e| MaintainError::pool(e.to_string(), "connecting to PostgreSQL"))?;
    client.simple_query("SELECT 1").await?;

    info!(
        "Connected to PostgreSQL: {}:{}/{}",
        config.host, config.port, config.database
    );

    Ok(pool)
}

/// Server message for a database error, falling back to the client error text.
pub(crate) fn describe(error: &tokio_postgres::Error) -> String {
    match error.as_db_error() {
        Some(db) => format!("{} ({}): {}", db.severity(), db.code().code(), db.message()),
        None => error.to_string(),
    }
}

/// Dependent objects or live foreign keys.
pub(crate) fn is_dependency_violation(error: &tokio_postgres::Error) -> bool {
    matches!(
        error.code(),
        Some(code) if *code == SqlState::DEPENDENT_OBJECTS_STILL_EXIST
            || *code == SqlState::FOREIGN_KEY_VIOLATION
    )
}
