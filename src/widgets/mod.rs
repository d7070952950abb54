/*!
 * Widgets
 * Widget types, widgets, their configuration values and the content types they may query
 */
pub mod binding;
pub mod values;

use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use crate::actor::ActorRef;
pub use crate::db::models::{NewWidget, Widget, WidgetFieldValue, WidgetType};
use crate::error::{CmsError, Result};
use crate::fields::registry::{self, is_valid_slug, FieldScope};
use crate::values::FieldValue;

const WIDGET_COLUMNS: &str = "id, theme_id, widget_type_id, name, slug, view_path, \
    content_query_id, created_by_type, created_by_id, updated_by_type, updated_by_id";

pub async fn create_widget_type(
    pool: &SqlitePool,
    name: &str,
    slug: &str,
    description: Option<&str>,
) -> Result<WidgetType> {
    if !is_valid_slug(slug) {
        return Err(CmsError::InvalidSlug(slug.to_string()));
    }

    let widget_type = sqlx::query_as::<_, WidgetType>(
        r#"
        INSERT INTO widget_types (name, slug, description)
        VALUES ($1, $2, $3)
        RETURNING id, name, slug, description
        "#,
    )
    .bind(name)
    .bind(slug)
    .bind(description)
    .fetch_one(pool)
    .await?;

    tracing::info!(widget_type_id = widget_type.id, slug = %slug, "widget type created");
    Ok(widget_type)
}

pub async fn find_widget_type(pool: &SqlitePool, id: i64) -> Result<Option<WidgetType>> {
    let widget_type = sqlx::query_as::<_, WidgetType>(
        "SELECT id, name, slug, description FROM widget_types WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(widget_type)
}

pub async fn create_widget(pool: &SqlitePool, widget: &NewWidget) -> Result<Widget> {
    if !is_valid_slug(&widget.slug) {
        return Err(CmsError::InvalidSlug(widget.slug.clone()));
    }

    let now = Utc::now();
    let (actor_type, actor_id) = ActorRef::into_columns(widget.created_by);
    let sql = format!(
        "INSERT INTO widgets (theme_id, widget_type_id, name, slug, view_path, \
         created_by_type, created_by_id, updated_by_type, updated_by_id, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $6, $7, $8, $8) RETURNING {}",
        WIDGET_COLUMNS
    );

    let created = sqlx::query_as::<_, Widget>(&sql)
        .bind(widget.theme_id)
        .bind(widget.widget_type_id)
        .bind(&widget.name)
        .bind(&widget.slug)
        .bind(&widget.view_path)
        .bind(actor_type)
        .bind(actor_id)
        .bind(now)
        .fetch_one(pool)
        .await?;

    tracing::info!(widget_id = created.id, slug = %created.slug, "widget created");
    Ok(created)
}

pub async fn find_widget(pool: &SqlitePool, id: i64) -> Result<Option<Widget>> {
    let sql = format!(
        "SELECT {} FROM widgets WHERE id = $1 AND deleted_at IS NULL",
        WIDGET_COLUMNS
    );
    let widget = sqlx::query_as::<_, Widget>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(widget)
}

impl Widget {
    /// Allow this widget to query the given content type.
    pub async fn allow_content_type(&self, pool: &SqlitePool, content_type_id: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO widget_content_types (widget_id, content_type_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(self.id)
        .bind(content_type_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn allowed_content_types(&self, pool: &SqlitePool) -> Result<Vec<i64>> {
        let ids: Vec<(i64,)> = sqlx::query_as(
            "SELECT content_type_id FROM widget_content_types WHERE widget_id = $1 \
             ORDER BY content_type_id",
        )
        .bind(self.id)
        .fetch_all(pool)
        .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// A widget with no associations may query any content type.
    pub async fn can_query(&self, pool: &SqlitePool, content_type_id: i64) -> Result<bool> {
        let allowed = self.allowed_content_types(pool).await?;
        Ok(allowed.is_empty() || allowed.contains(&content_type_id))
    }

    /// Decoded value of the widget's configuration field `key`. Widgets
    /// without a type, unknown keys and missing values read as null.
    pub async fn get_field_value(&self, pool: &SqlitePool, key: &str) -> Result<FieldValue> {
        let Some(widget_type_id) = self.widget_type_id else {
            return Ok(FieldValue::Null);
        };
        let Some(field) =
            registry::find_field_by_slug(pool, FieldScope::Widget, widget_type_id, key).await?
        else {
            tracing::debug!(widget_id = self.id, key = %key, "unknown widget field");
            return Ok(FieldValue::Null);
        };

        let stored = values::find_value(pool, self.id, field.id)
            .await?
            .unwrap_or_else(|| WidgetFieldValue::missing(self.id, field.id));
        stored.get_formatted_value(pool, &field).await
    }

    pub async fn set_field_value(
        &self,
        pool: &SqlitePool,
        key: &str,
        value: &Value,
    ) -> Result<WidgetFieldValue> {
        let unknown = || CmsError::UnknownWidgetField {
            widget_id: self.id,
            key: key.to_string(),
        };
        let widget_type_id = self.widget_type_id.ok_or_else(unknown)?;
        let field = registry::find_field_by_slug(pool, FieldScope::Widget, widget_type_id, key)
            .await?
            .ok_or_else(unknown)?;

        let raw = values::raw_for_storage(&field, value);
        values::upsert_value(pool, self.id, field.id, raw.as_deref()).await
    }

    /// Every configuration field of the widget's type, decoded, keyed by slug.
    pub async fn field_values(&self, pool: &SqlitePool) -> Result<BTreeMap<String, FieldValue>> {
        let Some(widget_type_id) = self.widget_type_id else {
            return Ok(BTreeMap::new());
        };
        let fields = registry::fields_for(pool, FieldScope::Widget, widget_type_id).await?;
        let stored = values::values_for_widget(pool, self.id).await?;

        let mut out = BTreeMap::new();
        for field in &fields {
            let value = stored
                .iter()
                .find(|v| v.field_id == field.id)
                .cloned()
                .unwrap_or_else(|| WidgetFieldValue::missing(self.id, field.id));
            out.insert(field.slug.clone(), value.get_formatted_value(pool, field).await?);
        }
        Ok(out)
    }
}
