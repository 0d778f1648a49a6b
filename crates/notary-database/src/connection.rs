//! PostgreSQL pool for the uniqueness tables.

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::info;

use notary_core::config::DatabaseConfig;
use notary_core::error::{AppError, ErrorKind};

use crate::error::classify;

/// Name reported in `pg_stat_activity`.
const APPLICATION_NAME: &str = "notary-uniqueness";

/// Tables the store cannot run without.
const REQUIRED_TABLES: [&str; 3] = [
    "uniqueness_state_details",
    "uniqueness_tx_details",
    "uniqueness_rejected_txs",
];

/// Shared handle to the notary's connection pool.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Open the pool described by `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let options = PgConnectOptions::from_str(&config.url)
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    "database.url is not a valid PostgreSQL URL",
                    e,
                )
            })?
            .application_name(APPLICATION_NAME);

        // Logged from the parsed options so credentials never reach the log
        info!(
            host = options.get_host(),
            port = options.get_port(),
            database = options.get_database().unwrap_or("<default>"),
            max_connections = config.max_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect_with(options)
            .await
            .map_err(|e| classify(e, "Failed to connect to database"))?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Wrap a pool opened elsewhere, e.g. by a test harness.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// True when the database answers and every uniqueness table exists.
    pub async fn health_check(&self) -> Result<bool, AppError> {
        let present: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM UNNEST($1::text[]) AS t(name) \
             WHERE to_regclass(t.name) IS NOT NULL",
        )
        .bind(REQUIRED_TABLES.as_slice())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "Health check failed"))?;

        let healthy = usize::try_from(present).is_ok_and(|n| n == REQUIRED_TABLES.len());
        if !healthy {
            tracing::warn!(present, "Uniqueness tables are missing; run migrations");
        }
        Ok(healthy)
    }

    /// Close every connection, waiting for checked-out ones to return.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}
