use thiserror::Error;

#[derive(Error, Debug)]
pub enum CmsError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database pool not initialized")]
    PoolNotInitialized,

    #[error("Invalid slug: {0}")]
    InvalidSlug(String),

    #[error("Unknown field '{key}' on content type {content_type_id}")]
    UnknownField { content_type_id: i64, key: String },

    #[error("Unknown field '{key}' on widget {widget_id}")]
    UnknownWidgetField { widget_id: i64, key: String },

    #[error("Widget not found: {0}")]
    WidgetNotFound(i64),
}

pub type Result<T> = std::result::Result<T, CmsError>;
