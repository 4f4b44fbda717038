//! # Database Persistence Layer
//!
//! PostgreSQL persistence for petitions via SQLx.
//!
//! ## What is persisted
//!
//! - `petitions`: one row per petition, transition log as JSONB
//! - `rejections`: at most one row per petition, upserted
//! - `signatures`: only touched here to scrub personal details
//!
//! Lifecycle constraints are enforced by `petitions-state`, not in SQL.

pub mod petitions;

pub use petitions::PgStore;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Connect to PostgreSQL and apply the embedded migrations.
pub async fn init_pool(url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}
