//! Schema migrations for the uniqueness tables.

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use tracing::info;

use notary_core::error::{AppError, ErrorKind};

/// Migrations embedded from the workspace `migrations/` directory.
static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Bring the uniqueness schema up to date.
///
/// Safe to call from several processes at once; sqlx serializes runs with
/// an advisory lock.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    info!(known = MIGRATOR.iter().count(), "Applying uniqueness schema migrations");

    MIGRATOR.run(pool).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Failed to migrate uniqueness schema: {e}"),
            e,
        )
    })?;

    info!("Uniqueness schema is up to date");
    Ok(())
}
