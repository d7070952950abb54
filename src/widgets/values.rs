use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;

use super::WidgetFieldValue;
use crate::error::Result;
use crate::fields::rules::{self, ValidationRules};
use crate::fields::{FieldDefinition, FieldType};
use crate::media::{self, WIDGET_FIELD_VALUE_OWNER};
use crate::values::decoder::media_collection;
use crate::values::{to_raw_value, DecodeInput, FieldValue, MediaFile, WIDGET_DECODERS};

impl WidgetFieldValue {
    pub(crate) fn missing(widget_id: i64, field_id: i64) -> Self {
        Self {
            id: 0,
            widget_id,
            field_id,
            value: None,
        }
    }

    /// Decode with already loaded media; only file and image fields use it.
    pub fn decode(&self, field: &FieldDefinition, media: &[MediaFile]) -> FieldValue {
        WIDGET_DECODERS.decode(&DecodeInput {
            raw: self.value.as_deref(),
            field,
            media,
        })
    }

    pub async fn get_formatted_value(
        &self,
        pool: &SqlitePool,
        field: &FieldDefinition,
    ) -> Result<FieldValue> {
        let media = match media_collection(&field.field_type) {
            Some(collection) if self.id > 0 => {
                media::collection(pool, WIDGET_FIELD_VALUE_OWNER, self.id, collection).await?
            }
            _ => Vec::new(),
        };
        Ok(self.decode(field, &media))
    }
}

/// Validation metadata for one widget field value. Never fails.
pub fn validate_value(value: Value, field: &FieldDefinition) -> ValidationRules {
    rules::single(field, value, rules::widget_rules(field))
}

/// Encode a submitted value for the text column. Rich text is sanitized;
/// multi-choice fields always store a JSON array.
pub fn raw_for_storage(field: &FieldDefinition, value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(html) if field.field_type == FieldType::Wysiwyg => {
            Some(ammonia::clean(html))
        }
        Value::String(s) if field.field_type.is_multi_choice() => {
            if s.is_empty() {
                Some("[]".to_string())
            } else if serde_json::from_str::<Vec<Value>>(s).is_ok() {
                Some(s.clone())
            } else {
                Some(Value::Array(vec![value.clone()]).to_string())
            }
        }
        Value::Array(_) => to_raw_value(value),
        scalar if field.field_type.is_multi_choice() => {
            Some(Value::Array(vec![scalar.clone()]).to_string())
        }
        _ => to_raw_value(value),
    }
}

pub async fn find_value(
    pool: &SqlitePool,
    widget_id: i64,
    field_id: i64,
) -> Result<Option<WidgetFieldValue>> {
    let value = sqlx::query_as::<_, WidgetFieldValue>(
        "SELECT id, widget_id, field_id, value FROM widget_field_values \
         WHERE widget_id = $1 AND field_id = $2",
    )
    .bind(widget_id)
    .bind(field_id)
    .fetch_optional(pool)
    .await?;
    Ok(value)
}

pub async fn values_for_widget(pool: &SqlitePool, widget_id: i64) -> Result<Vec<WidgetFieldValue>> {
    let values = sqlx::query_as::<_, WidgetFieldValue>(
        "SELECT id, widget_id, field_id, value FROM widget_field_values WHERE widget_id = $1",
    )
    .bind(widget_id)
    .fetch_all(pool)
    .await?;
    Ok(values)
}

pub async fn upsert_value(
    pool: &SqlitePool,
    widget_id: i64,
    field_id: i64,
    raw: Option<&str>,
) -> Result<WidgetFieldValue> {
    let now = Utc::now();
    let value = sqlx::query_as::<_, WidgetFieldValue>(
        r#"
        INSERT INTO widget_field_values (widget_id, field_id, value, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $4)
        ON CONFLICT (widget_id, field_id) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
        RETURNING id, widget_id, field_id, value
        "#,
    )
    .bind(widget_id)
    .bind(field_id)
    .bind(raw)
    .bind(now)
    .fetch_one(pool)
    .await?;

    tracing::debug!(widget_id, field_id, "widget field value stored");
    Ok(value)
}
