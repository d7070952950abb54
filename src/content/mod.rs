/*!
 * Content
 * Content types, content items and their keyed field values
 */
pub mod values;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use crate::actor::ActorRef;
pub use crate::db::models::{ContentFieldValue, ContentItem, ContentType, NewContentItem};
use crate::error::{CmsError, Result};
use crate::fields::registry::{self, is_valid_slug, FieldScope};
use crate::values::{to_raw_value, FieldValue};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContentStatus {
    #[default]
    Draft,
    Published,
    Archived,
    Other(String),
}

impl ContentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Published => "published",
            ContentStatus::Archived => "archived",
            ContentStatus::Other(s) => s,
        }
    }
}

impl From<String> for ContentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "draft" => ContentStatus::Draft,
            "published" => ContentStatus::Published,
            "archived" => ContentStatus::Archived,
            _ => ContentStatus::Other(s),
        }
    }
}

impl From<ContentStatus> for String {
    fn from(s: ContentStatus) -> Self {
        s.as_str().to_string()
    }
}

pub(crate) const ITEM_COLUMNS: &str = "id, content_type_id, title, slug, status, published_at, \
    created_by_type, created_by_id, updated_by_type, updated_by_id, created_at, updated_at";

pub async fn create_content_type(
    pool: &SqlitePool,
    name: &str,
    slug: &str,
    description: Option<&str>,
) -> Result<ContentType> {
    if !is_valid_slug(slug) {
        return Err(CmsError::InvalidSlug(slug.to_string()));
    }

    let now = Utc::now();
    let content_type = sqlx::query_as::<_, ContentType>(
        r#"
        INSERT INTO content_types (name, slug, description, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $4)
        RETURNING id, name, slug, description, created_at, updated_at
        "#,
    )
    .bind(name)
    .bind(slug)
    .bind(description)
    .bind(now)
    .fetch_one(pool)
    .await?;

    tracing::info!(content_type_id = content_type.id, slug = %slug, "content type created");
    Ok(content_type)
}

pub async fn find_content_type(pool: &SqlitePool, id: i64) -> Result<Option<ContentType>> {
    let content_type = sqlx::query_as::<_, ContentType>(
        "SELECT id, name, slug, description, created_at, updated_at FROM content_types \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(content_type)
}

pub async fn find_content_type_by_slug(
    pool: &SqlitePool,
    slug: &str,
) -> Result<Option<ContentType>> {
    let content_type = sqlx::query_as::<_, ContentType>(
        "SELECT id, name, slug, description, created_at, updated_at FROM content_types \
         WHERE slug = $1 AND deleted_at IS NULL",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    Ok(content_type)
}

pub async fn create_item(pool: &SqlitePool, item: &NewContentItem) -> Result<ContentItem> {
    let now = Utc::now();
    let status = item.status.clone().unwrap_or_default();
    let (actor_type, actor_id) = ActorRef::into_columns(item.created_by);

    let sql = format!(
        "INSERT INTO content_items (content_type_id, title, slug, status, published_at, \
         created_by_type, created_by_id, updated_by_type, updated_by_id, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $6, $7, $8, $8) RETURNING {}",
        ITEM_COLUMNS
    );

    let created = sqlx::query_as::<_, ContentItem>(&sql)
        .bind(item.content_type_id)
        .bind(&item.title)
        .bind(&item.slug)
        .bind(status.as_str())
        .bind(item.published_at)
        .bind(actor_type)
        .bind(actor_id)
        .bind(now)
        .fetch_one(pool)
        .await?;

    tracing::debug!(item_id = created.id, content_type_id = created.content_type_id, "content item created");
    Ok(created)
}

pub async fn find_item(pool: &SqlitePool, id: i64) -> Result<Option<ContentItem>> {
    let sql = format!(
        "SELECT {} FROM content_items WHERE id = $1 AND deleted_at IS NULL",
        ITEM_COLUMNS
    );
    let item = sqlx::query_as::<_, ContentItem>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(item)
}

/// Soft-delete an item together with its field values.
pub async fn delete_item(pool: &SqlitePool, id: i64) -> Result<bool> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE content_items SET deleted_at = $1 WHERE id = $2 AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE content_field_values SET deleted_at = $1 WHERE content_item_id = $2 AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

impl ContentItem {
    /// Decoded value of the field with slug `key`. Unknown keys and missing
    /// values read as null.
    pub async fn get_field_value(&self, pool: &SqlitePool, key: &str) -> Result<FieldValue> {
        let Some(field) =
            registry::find_field_by_slug(pool, FieldScope::Content, self.content_type_id, key)
                .await?
        else {
            tracing::debug!(item_id = self.id, key = %key, "unknown content field");
            return Ok(FieldValue::Null);
        };

        let stored = values::find_value(pool, self.id, field.id)
            .await?
            .unwrap_or_else(|| ContentFieldValue::missing(self.id, field.id));
        Ok(stored.get_formatted_value(&field))
    }

    /// Upsert the raw value of the field with slug `key`.
    pub async fn set_field_value(
        &self,
        pool: &SqlitePool,
        key: &str,
        value: &Value,
    ) -> Result<ContentFieldValue> {
        let field =
            registry::find_field_by_slug(pool, FieldScope::Content, self.content_type_id, key)
                .await?
                .ok_or_else(|| CmsError::UnknownField {
                    content_type_id: self.content_type_id,
                    key: key.to_string(),
                })?;

        values::upsert_value(pool, self.id, field.id, to_raw_value(value).as_deref()).await
    }

    /// Every field of the item's content type, decoded, keyed by slug.
    pub async fn field_values(&self, pool: &SqlitePool) -> Result<BTreeMap<String, FieldValue>> {
        let fields = registry::fields_for(pool, FieldScope::Content, self.content_type_id).await?;
        let stored = values::values_for_item(pool, self.id).await?;

        Ok(fields
            .iter()
            .map(|field| {
                let value = stored
                    .iter()
                    .find(|v| v.field_id == field.id)
                    .cloned()
                    .unwrap_or_else(|| ContentFieldValue::missing(self.id, field.id));
                (field.slug.clone(), value.get_formatted_value(field))
            })
            .collect())
    }
}
