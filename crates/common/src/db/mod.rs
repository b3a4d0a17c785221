//! Database layer for ReviewForge
//!
//! Provides:
//! - SeaORM entity models
//! - Postgres-backed `ManuscriptStore`
//! - Connection pool management
//! - Schema migrations

pub mod models;
mod repository;

pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    /// Primary connection (for writes)
    pub primary: DatabaseConnection,

    /// Read replica connection (optional)
    pub replica: Option<DatabaseConnection>,
}

fn connect_options(url: &str, config: &DatabaseConfig) -> ConnectOptions {
    let mut opts = ConnectOptions::new(url);
    opts.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .sqlx_logging(true);
    opts
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to primary database...");

        let primary = Database::connect(connect_options(&config.url, config))
            .await
            .map_err(|e| AppError::StoreUnavailable {
                message: format!("Failed to connect to primary: {}", e),
            })?;

        let replica = if let Some(ref read_url) = config.read_url {
            info!("Connecting to read replica...");

            let replica_conn = Database::connect(connect_options(read_url, config))
                .await
                .map_err(|e| AppError::StoreUnavailable {
                    message: format!("Failed to connect to replica: {}", e),
                })?;

            Some(replica_conn)
        } else {
            None
        };

        info!("Database connections established");

        Ok(Self { primary, replica })
    }

    /// Get the connection for reads (replica if available, otherwise primary)
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    /// Get the connection for writes (always primary)
    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Apply pending SQL migrations from `dir` against the primary
    pub async fn migrate(&self, dir: &Path) -> Result<()> {
        info!(path = %dir.display(), "Running database migrations");

        let migrator = sqlx::migrate::Migrator::new(dir)
            .await
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to read migrations: {}", e),
            })?;

        migrator
            .run(self.primary.get_postgres_connection_pool())
            .await
            .map_err(|e| AppError::StoreUnavailable {
                message: format!("Migration failed: {}", e),
            })?;

        info!("Database migrations applied");
        Ok(())
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;

        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| ping_failed("primary", e))?;

        if let Some(ref replica) = self.replica {
            replica
                .execute_unprepared("SELECT 1")
                .await
                .map_err(|e| ping_failed("replica", e))?;
        }

        Ok(())
    }
}

/// Driver text stays in the logs; callers only see which connection failed
fn ping_failed(connection: &'static str, err: DbErr) -> AppError {
    error!(connection, error = %err, "Database ping failed");
    AppError::StoreUnavailable {
        message: format!("Database {} unreachable", connection),
    }
}
