//! Media attachment descriptors.
//!
//! File storage and conversions live elsewhere; this module only records and
//! lists the descriptors attached to an owner under a named collection.

use sqlx::SqlitePool;

use crate::db::models::{MediaFile, NewMedia};
use crate::error::Result;

/// Owner type under which widget field uploads are attached.
pub const WIDGET_FIELD_VALUE_OWNER: &str = "widget_field_value";

pub async fn collection(
    pool: &SqlitePool,
    model_type: &str,
    model_id: i64,
    collection_name: &str,
) -> Result<Vec<MediaFile>> {
    let files = sqlx::query_as::<_, MediaFile>(
        r#"
        SELECT id, collection_name, file_name, mime_type, size, url
        FROM media
        WHERE model_type = $1 AND model_id = $2 AND collection_name = $3
        ORDER BY order_column ASC, id ASC
        "#,
    )
    .bind(model_type)
    .bind(model_id)
    .bind(collection_name)
    .fetch_all(pool)
    .await?;

    Ok(files)
}

pub async fn attach(pool: &SqlitePool, media: &NewMedia) -> Result<MediaFile> {
    let file = sqlx::query_as::<_, MediaFile>(
        r#"
        INSERT INTO media (model_type, model_id, collection_name, file_name, mime_type, size, url, order_column)
        VALUES ($1, $2, $3, $4, $5, $6, $7,
            (SELECT COALESCE(MAX(order_column), -1) + 1 FROM media
             WHERE model_type = $1 AND model_id = $2 AND collection_name = $3))
        RETURNING id, collection_name, file_name, mime_type, size, url
        "#,
    )
    .bind(&media.model_type)
    .bind(media.model_id)
    .bind(&media.collection_name)
    .bind(&media.file_name)
    .bind(&media.mime_type)
    .bind(media.size)
    .bind(&media.url)
    .fetch_one(pool)
    .await?;

    tracing::debug!(
        media_id = file.id,
        owner = %media.model_type,
        owner_id = media.model_id,
        collection = %media.collection_name,
        "media attached"
    );

    Ok(file)
}
