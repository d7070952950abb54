pub mod models;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::{str::FromStr, sync::Arc};
use tokio::sync::OnceCell;

use crate::error::CmsError;

static DB_POOL: OnceCell<Arc<SqlitePool>> = OnceCell::const_new();

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: env_or("DATABASE_URL", "sqlite://cms.db?mode=rwc".to_string()),
            max_connections: env_or("DB_POOL_MAX", 10),
            min_connections: env_or("DB_POOL_MIN", 1),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT", 10),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT", 300),
        }
    }
}

/// Value of `key` parsed as `T`, or `default` when unset or unparsable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

pub async fn init_pool(config: Option<DbConfig>) -> Result<Arc<SqlitePool>, sqlx::Error> {
    let config = config.unwrap_or_default();

    tracing::info!("Initializing database connection pool...");
    tracing::debug!(url = %config.url, "database url");

    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(std::time::Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect_with(options)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    tracing::info!("Database connection pool initialized successfully");

    let pool = Arc::new(pool);
    let _ = DB_POOL.set(pool.clone());

    Ok(pool)
}

pub fn get_pool() -> Option<Arc<SqlitePool>> {
    DB_POOL.get().cloned()
}

pub async fn health_check() -> crate::error::Result<std::time::Duration> {
    let pool = get_pool().ok_or(CmsError::PoolNotInitialized)?;

    let start = std::time::Instant::now();
    sqlx::query("SELECT 1").fetch_one(pool.as_ref()).await?;

    Ok(start.elapsed())
}

/// Schema for every table the engine reads or writes. Each statement is
/// idempotent so the list can be replayed on every start.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS content_types (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        description TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        deleted_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS content_type_fields (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        content_type_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        slug TEXT NOT NULL,
        field_type TEXT NOT NULL,
        is_required BOOLEAN NOT NULL DEFAULT 0,
        is_unique BOOLEAN NOT NULL DEFAULT 0,
        position INTEGER NOT NULL DEFAULT 0,
        validation_rules TEXT,
        settings TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        deleted_at TEXT,
        UNIQUE (content_type_id, slug)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS content_type_field_options (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        field_id INTEGER NOT NULL,
        value TEXT NOT NULL,
        label TEXT NOT NULL,
        order_index INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS content_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        content_type_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        slug TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'draft',
        published_at TEXT,
        created_by_type TEXT,
        created_by_id INTEGER,
        updated_by_type TEXT,
        updated_by_id INTEGER,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        deleted_at TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_content_items_type ON content_items(content_type_id)",
    r#"
    CREATE TABLE IF NOT EXISTS content_field_values (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        content_item_id INTEGER NOT NULL,
        field_id INTEGER NOT NULL,
        value TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        deleted_at TEXT,
        UNIQUE (content_item_id, field_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS widget_types (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        description TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS widget_type_fields (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        widget_type_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        slug TEXT NOT NULL,
        field_type TEXT NOT NULL,
        is_required BOOLEAN NOT NULL DEFAULT 0,
        is_unique BOOLEAN NOT NULL DEFAULT 0,
        position INTEGER NOT NULL DEFAULT 0,
        validation_rules TEXT,
        settings TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        deleted_at TEXT,
        UNIQUE (widget_type_id, slug)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS widget_type_field_options (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        field_id INTEGER NOT NULL,
        value TEXT NOT NULL,
        label TEXT NOT NULL,
        order_index INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS widget_content_queries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        content_type_id INTEGER NOT NULL,
        query_limit INTEGER,
        query_offset INTEGER,
        order_by TEXT,
        order_direction TEXT NOT NULL DEFAULT 'asc',
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS widget_content_query_filters (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        query_id INTEGER NOT NULL,
        field_id INTEGER,
        field_key TEXT,
        operator TEXT NOT NULL DEFAULT 'equals',
        value TEXT NOT NULL DEFAULT '',
        condition_group TEXT,
        position INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS widgets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        theme_id INTEGER,
        widget_type_id INTEGER,
        name TEXT NOT NULL,
        slug TEXT NOT NULL,
        view_path TEXT,
        content_query_id INTEGER,
        created_by_type TEXT,
        created_by_id INTEGER,
        updated_by_type TEXT,
        updated_by_id INTEGER,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        deleted_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS widget_field_values (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        widget_id INTEGER NOT NULL,
        field_id INTEGER NOT NULL,
        value TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (widget_id, field_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS widget_content_types (
        widget_id INTEGER NOT NULL,
        content_type_id INTEGER NOT NULL,
        PRIMARY KEY (widget_id, content_type_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS page_section_widgets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        page_section_id INTEGER NOT NULL,
        widget_id INTEGER NOT NULL,
        position INTEGER NOT NULL DEFAULT 0,
        x INTEGER NOT NULL DEFAULT 0,
        y INTEGER NOT NULL DEFAULT 0,
        width INTEGER NOT NULL DEFAULT 12,
        height INTEGER NOT NULL DEFAULT 1,
        settings TEXT,
        content_query TEXT,
        css_classes TEXT,
        custom_css TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_page_section_widgets_section ON page_section_widgets(page_section_id, position)",
    r#"
    CREATE TABLE IF NOT EXISTS media (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        model_type TEXT NOT NULL,
        model_id INTEGER NOT NULL,
        collection_name TEXT NOT NULL,
        file_name TEXT NOT NULL,
        mime_type TEXT,
        size INTEGER NOT NULL DEFAULT 0,
        url TEXT NOT NULL,
        order_column INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_media_owner ON media(model_type, model_id, collection_name)",
];

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!(tables = SCHEMA.len(), "Database migrations completed successfully");

    Ok(())
}

/// Single-connection in-memory pool with the schema applied. The connection
/// is never recycled, so the database lives as long as the pool.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_default_uses_env_or_fallback() {
        let config = DbConfig::default();
        assert!(config.max_connections >= 1);
        assert!(config.connect_timeout_secs >= 1);
        assert!(config.idle_timeout_secs >= 1);
        assert!(!config.url.is_empty());
    }

    #[test]
    fn test_env_or_falls_back_when_unset_or_unparsable() {
        assert_eq!(env_or("CMS_ENGINE_TEST_UNSET_VARIABLE", 42u32), 42);
        // PATH is always set and never a number.
        assert_eq!(env_or("PATH", 7u64), 7);
        assert!(!env_or("PATH", String::new()).is_empty());
    }

    #[test]
    fn test_get_pool_none_before_init() {
        let pool = get_pool();
        assert!(pool.is_none());
    }

    #[tokio::test]
    async fn test_health_check_fails_without_pool() {
        let result = health_check().await;
        assert!(matches!(result, Err(CmsError::PoolNotInitialized)));
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = test_pool().await;
        run_migrations(&pool).await.unwrap();

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'content_field_values'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }
}
