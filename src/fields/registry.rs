//! Field definition lookups.
//!
//! Content-type fields and widget-type fields live in parallel tables with
//! identical shapes; [`FieldScope`] selects which pair of tables a lookup
//! runs against.

use regex::Regex;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;

use super::{FieldDefinition, FieldOption, NewField};
use crate::error::{CmsError, Result};

lazy_static::lazy_static! {
    /// Lowercase letters and digits separated by single hyphens or underscores
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:[-_][a-z0-9]+)*$").unwrap();
}

pub(crate) fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldScope {
    Content,
    Widget,
}

impl FieldScope {
    fn fields_table(&self) -> &'static str {
        match self {
            FieldScope::Content => "content_type_fields",
            FieldScope::Widget => "widget_type_fields",
        }
    }

    fn options_table(&self) -> &'static str {
        match self {
            FieldScope::Content => "content_type_field_options",
            FieldScope::Widget => "widget_type_field_options",
        }
    }

    fn owner_column(&self) -> &'static str {
        match self {
            FieldScope::Content => "content_type_id",
            FieldScope::Widget => "widget_type_id",
        }
    }

    fn select_fields(&self) -> String {
        format!(
            "SELECT id, {} AS owner_id, name, slug, field_type, is_required, is_unique, \
             position, validation_rules, settings FROM {} WHERE deleted_at IS NULL",
            self.owner_column(),
            self.fields_table()
        )
    }
}

/// Attach option sets to the given definitions, in `order_index` order.
async fn load_options(
    pool: &SqlitePool,
    scope: FieldScope,
    fields: &mut [FieldDefinition],
) -> Result<()> {
    if !fields.iter().any(|f| f.field_type.is_choice()) {
        return Ok(());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT field_id, value, label, order_index FROM {} WHERE field_id IN (",
        scope.options_table()
    ));
    let mut ids = qb.separated(", ");
    for field in fields.iter() {
        ids.push_bind(field.id);
    }
    ids.push_unseparated(") ORDER BY order_index ASC, id ASC");

    let rows: Vec<(i64, String, String, i64)> = qb.build_query_as().fetch_all(pool).await?;

    let mut by_field: HashMap<i64, Vec<FieldOption>> = HashMap::new();
    for (field_id, value, label, order_index) in rows {
        by_field.entry(field_id).or_default().push(FieldOption {
            value,
            label,
            order_index,
        });
    }

    for field in fields.iter_mut() {
        field.options = by_field.remove(&field.id).unwrap_or_default();
    }

    Ok(())
}

pub async fn find_field(
    pool: &SqlitePool,
    scope: FieldScope,
    id: i64,
) -> Result<Option<FieldDefinition>> {
    let sql = format!("{} AND id = $1", scope.select_fields());
    let field = sqlx::query_as::<_, FieldDefinition>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match field {
        Some(field) => {
            let mut fields = [field];
            load_options(pool, scope, &mut fields).await?;
            let [field] = fields;
            Ok(Some(field))
        }
        None => Ok(None),
    }
}

pub async fn find_field_by_slug(
    pool: &SqlitePool,
    scope: FieldScope,
    owner_id: i64,
    slug: &str,
) -> Result<Option<FieldDefinition>> {
    let sql = format!(
        "{} AND {} = $1 AND slug = $2",
        scope.select_fields(),
        scope.owner_column()
    );
    let field = sqlx::query_as::<_, FieldDefinition>(&sql)
        .bind(owner_id)
        .bind(slug)
        .fetch_optional(pool)
        .await?;

    match field {
        Some(field) => {
            let mut fields = [field];
            load_options(pool, scope, &mut fields).await?;
            let [field] = fields;
            Ok(Some(field))
        }
        None => Ok(None),
    }
}

/// All live fields of a content type or widget type, by position.
pub async fn fields_for(
    pool: &SqlitePool,
    scope: FieldScope,
    owner_id: i64,
) -> Result<Vec<FieldDefinition>> {
    let sql = format!(
        "{} AND {} = $1 ORDER BY position ASC, id ASC",
        scope.select_fields(),
        scope.owner_column()
    );
    let mut fields = sqlx::query_as::<_, FieldDefinition>(&sql)
        .bind(owner_id)
        .fetch_all(pool)
        .await?;

    load_options(pool, scope, &mut fields).await?;
    Ok(fields)
}

pub async fn create_field(
    pool: &SqlitePool,
    scope: FieldScope,
    field: &NewField,
) -> Result<FieldDefinition> {
    if !is_valid_slug(&field.slug) {
        return Err(CmsError::InvalidSlug(field.slug.clone()));
    }

    let sql = format!(
        "INSERT INTO {} ({}, name, slug, field_type, is_required, is_unique, position, \
         validation_rules, settings) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
        scope.fields_table(),
        scope.owner_column()
    );
    let settings = field
        .settings
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let (id,): (i64,) = sqlx::query_as(&sql)
        .bind(field.owner_id)
        .bind(&field.name)
        .bind(&field.slug)
        .bind(field.field_type.as_str())
        .bind(field.is_required)
        .bind(field.is_unique)
        .bind(field.position)
        .bind(&field.validation_rules)
        .bind(&settings)
        .fetch_one(pool)
        .await?;

    tracing::debug!(field_id = id, slug = %field.slug, field_type = %field.field_type, "field created");

    find_field(pool, scope, id)
        .await?
        .ok_or(CmsError::Database(sqlx::Error::RowNotFound))
}

pub async fn add_option(
    pool: &SqlitePool,
    scope: FieldScope,
    field_id: i64,
    value: &str,
    label: &str,
    order_index: i64,
) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} (field_id, value, label, order_index) VALUES ($1, $2, $3, $4)",
        scope.options_table()
    );
    sqlx::query(&sql)
        .bind(field_id)
        .bind(value)
        .bind(label)
        .bind(order_index)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::fields::FieldType;

    fn new_field(owner_id: i64, slug: &str, field_type: FieldType, position: i64) -> NewField {
        NewField {
            owner_id,
            name: slug.to_string(),
            slug: slug.to_string(),
            field_type,
            is_required: false,
            is_unique: false,
            position,
            validation_rules: None,
            settings: None,
        }
    }

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("hero_image"));
        assert!(is_valid_slug("blog-post-2"));
        assert!(!is_valid_slug("Hero"));
        assert!(!is_valid_slug("a--b"));
        assert!(!is_valid_slug(""));
    }

    #[tokio::test]
    async fn test_create_field_rejects_invalid_slug() {
        let pool = test_pool().await;
        let result = create_field(
            &pool,
            FieldScope::Content,
            &new_field(1, "Bad Slug", FieldType::Text, 0),
        )
        .await;
        assert!(matches!(result, Err(CmsError::InvalidSlug(_))));
    }

    #[tokio::test]
    async fn test_options_preserve_order_index() {
        let pool = test_pool().await;
        let field = create_field(
            &pool,
            FieldScope::Widget,
            &new_field(3, "layout", FieldType::Radio, 0),
        )
        .await
        .unwrap();

        add_option(&pool, FieldScope::Widget, field.id, "grid", "Grid", 2).await.unwrap();
        add_option(&pool, FieldScope::Widget, field.id, "list", "List", 0).await.unwrap();
        add_option(&pool, FieldScope::Widget, field.id, "cards", "Cards", 1).await.unwrap();

        let field = find_field(&pool, FieldScope::Widget, field.id)
            .await
            .unwrap()
            .unwrap();
        let labels: Vec<&str> = field.options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["List", "Cards", "Grid"]);
    }

    #[tokio::test]
    async fn test_fields_for_loads_options_of_every_choice_field() {
        let pool = test_pool().await;
        let size = create_field(&pool, FieldScope::Content, &new_field(7, "size", FieldType::Select, 0))
            .await
            .unwrap();
        create_field(&pool, FieldScope::Content, &new_field(7, "notes", FieldType::Text, 1))
            .await
            .unwrap();
        let tone = create_field(&pool, FieldScope::Content, &new_field(7, "tone", FieldType::Radio, 2))
            .await
            .unwrap();

        add_option(&pool, FieldScope::Content, size.id, "l", "Large", 1).await.unwrap();
        add_option(&pool, FieldScope::Content, size.id, "s", "Small", 0).await.unwrap();
        add_option(&pool, FieldScope::Content, tone.id, "warm", "Warm", 0).await.unwrap();

        let fields = fields_for(&pool, FieldScope::Content, 7).await.unwrap();
        let labels: Vec<Vec<&str>> = fields
            .iter()
            .map(|f| f.options.iter().map(|o| o.label.as_str()).collect())
            .collect();
        assert_eq!(labels, vec![vec!["Small", "Large"], vec![], vec!["Warm"]]);
    }

    #[tokio::test]
    async fn test_fields_for_orders_by_position_and_scopes_by_owner() {
        let pool = test_pool().await;
        for (slug, pos) in [("body", 2), ("summary", 1)] {
            create_field(&pool, FieldScope::Content, &new_field(1, slug, FieldType::Text, pos))
                .await
                .unwrap();
        }
        create_field(&pool, FieldScope::Content, &new_field(2, "other", FieldType::Text, 0))
            .await
            .unwrap();

        let fields = fields_for(&pool, FieldScope::Content, 1).await.unwrap();
        let slugs: Vec<&str> = fields.iter().map(|f| f.slug.as_str()).collect();
        assert_eq!(slugs, vec!["summary", "body"]);

        let found = find_field_by_slug(&pool, FieldScope::Content, 2, "other")
            .await
            .unwrap();
        assert!(found.is_some());
        assert!(find_field_by_slug(&pool, FieldScope::Content, 1, "other")
            .await
            .unwrap()
            .is_none());
    }
}
