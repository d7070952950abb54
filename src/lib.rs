//! CMS Engine - widget content queries and dynamic field-value resolution

pub mod actor;
pub mod content;
pub mod db;
pub mod error;
pub mod fields;
pub mod logging;
pub mod media;
pub mod query;
pub mod values;
pub mod widgets;

pub use error::{CmsError, Result};

/// Bootstrap the engine (used by main): environment, logging, pool, schema.
pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();

    // Dropping the guards stops the background log writers.
    let _log_guards = logging::init(&logging::LoggingConfig::default());

    let pool = db::init_pool(None).await?;
    db::run_migrations(&pool).await?;

    let latency = db::health_check().await?;
    tracing::info!(latency_ms = latency.as_millis() as u64, "Database is healthy");

    Ok(())
}
