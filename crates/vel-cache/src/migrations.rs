//! # Cache Migrations
//!
//! Embedded SQL migrations for the cache database.
//!
//! ## Adding New Migrations
//!
//! 1. Create a new file in `migrations/sqlite/` with the next sequence number
//! 2. Name format: `NNN_description.sql`
//! 3. Never modify an applied migration, add a new one

use sqlx::SqlitePool;
use tracing::info;

use crate::error::CacheResult;

/// Migrations embedded from the workspace `migrations/sqlite` directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending migrations, each in its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> CacheResult<()> {
    info!("Checking for pending cache migrations");

    MIGRATOR.run(pool).await?;

    info!("Cache migrations applied");
    Ok(())
}

/// Returns `(total_migrations, applied_migrations)`.
pub async fn migration_status(pool: &SqlitePool) -> CacheResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?;

    Ok((total, applied as usize))
}
