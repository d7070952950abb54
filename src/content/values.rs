use chrono::Utc;
use sqlx::SqlitePool;

use super::ContentFieldValue;
use crate::error::Result;
use crate::fields::FieldDefinition;
use crate::values::{DecodeInput, FieldValue, CONTENT_DECODERS};

impl ContentFieldValue {
    /// Stand-in for an item that has no row for the field.
    pub(crate) fn missing(content_item_id: i64, field_id: i64) -> Self {
        Self {
            id: 0,
            content_item_id,
            field_id,
            value: None,
        }
    }

    pub fn get_formatted_value(&self, field: &FieldDefinition) -> FieldValue {
        CONTENT_DECODERS.decode(&DecodeInput {
            raw: self.value.as_deref(),
            field,
            media: &[],
        })
    }
}

pub async fn find_value(
    pool: &SqlitePool,
    content_item_id: i64,
    field_id: i64,
) -> Result<Option<ContentFieldValue>> {
    let value = sqlx::query_as::<_, ContentFieldValue>(
        r#"
        SELECT id, content_item_id, field_id, value
        FROM content_field_values
        WHERE content_item_id = $1 AND field_id = $2 AND deleted_at IS NULL
        "#,
    )
    .bind(content_item_id)
    .bind(field_id)
    .fetch_optional(pool)
    .await?;
    Ok(value)
}

pub async fn values_for_item(
    pool: &SqlitePool,
    content_item_id: i64,
) -> Result<Vec<ContentFieldValue>> {
    let values = sqlx::query_as::<_, ContentFieldValue>(
        r#"
        SELECT id, content_item_id, field_id, value
        FROM content_field_values
        WHERE content_item_id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(content_item_id)
    .fetch_all(pool)
    .await?;
    Ok(values)
}

/// Insert or overwrite the value for (item, field). A soft-deleted row is
/// revived rather than duplicated.
pub async fn upsert_value(
    pool: &SqlitePool,
    content_item_id: i64,
    field_id: i64,
    raw: Option<&str>,
) -> Result<ContentFieldValue> {
    let now = Utc::now();
    let value = sqlx::query_as::<_, ContentFieldValue>(
        r#"
        INSERT INTO content_field_values (content_item_id, field_id, value, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $4)
        ON CONFLICT (content_item_id, field_id) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at,
            deleted_at = NULL
        RETURNING id, content_item_id, field_id, value
        "#,
    )
    .bind(content_item_id)
    .bind(field_id)
    .bind(raw)
    .bind(now)
    .fetch_one(pool)
    .await?;

    tracing::debug!(content_item_id, field_id, "content field value stored");
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::fixtures;
    use crate::db::test_pool;
    use crate::fields::FieldType;

    #[tokio::test]
    async fn test_upsert_revives_soft_deleted_value() {
        let pool = test_pool().await;
        let article = fixtures::content_type(&pool, "article").await;
        let field = fixtures::field(&pool, article.id, "subtitle", FieldType::Text).await;
        let item = fixtures::item(&pool, article.id, "A").await;

        let first = upsert_value(&pool, item.id, field.id, Some("x")).await.unwrap();
        sqlx::query("UPDATE content_field_values SET deleted_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(first.id)
            .execute(&pool)
            .await
            .unwrap();
        assert!(find_value(&pool, item.id, field.id).await.unwrap().is_none());

        let revived = upsert_value(&pool, item.id, field.id, Some("y")).await.unwrap();
        assert_eq!(revived.id, first.id);
        assert_eq!(
            find_value(&pool, item.id, field.id).await.unwrap().unwrap().value.as_deref(),
            Some("y")
        );
    }

    #[test]
    fn test_missing_value_decodes_as_null() {
        let field = crate::fields::definition(1, "Rating", FieldType::Number);
        assert_eq!(
            ContentFieldValue::missing(1, 1).get_formatted_value(&field),
            FieldValue::Null
        );
    }
}
