//! Sweeps locations and crime types that no crime report references.
//!
//! Deletes reclaim linked records best-effort; this script picks up whatever
//! a failed reclaim left behind.

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::env;

/// Main entry point for the cleanup script.
///
/// Records created in the last hour are skipped so rows belonging to an
/// in-flight update are left alone.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt::init();

    let database_url = env::var("DB_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("DB_URL or DATABASE_URL must be set"))?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database. Starting cleanup of orphaned records...");

    let mut tx = pool.begin().await?;

    let crime_types = sqlx::query(
        r#"
        DELETE FROM crime_types t
        WHERE NOT EXISTS (
            SELECT 1 FROM crime_reports r WHERE r.crime_type_id = t.id
        )
        AND t.created_at < NOW() - INTERVAL '1 hour'
        "#,
    )
    .execute(&mut *tx)
    .await?;

    let locations = sqlx::query(
        r#"
        DELETE FROM locations l
        WHERE NOT EXISTS (
            SELECT 1 FROM crime_reports r WHERE r.location_id = l.id
        )
        AND l.created_at < NOW() - INTERVAL '1 hour'
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        "Cleanup complete. Deleted {} crime types and {} locations.",
        crime_types.rows_affected(),
        locations.rows_affected()
    );

    Ok(())
}
