//! Schema migrations for the job queue and submission tables.

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use tracing::{debug, info};

use formflow_core::error::{AppError, ErrorKind};

/// Migrations embedded from the workspace `migrations/` directory.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Bring the schema up to date. Already applied versions are skipped.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    for migration in MIGRATOR.iter() {
        debug!(
            version = migration.version,
            description = %migration.description,
            "Known migration"
        );
    }

    MIGRATOR.run(pool).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Failed to apply formflow schema: {e}"),
            e,
        )
    })?;

    info!(known = MIGRATOR.iter().count(), "Formflow schema is current");
    Ok(())
}
