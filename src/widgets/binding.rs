//! Widget binding.
//!
//! A widget's content query is stored normalized (`widget_content_queries`
//! plus ordered `widget_content_query_filters`). Each placement of the widget
//! also carries a JSON copy of the same query, rewritten whenever the
//! normalized query is saved. Resolution prefers the normalized form and
//! falls back to the placement JSON.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::{find_widget, Widget};
use crate::content::ContentItem;
use crate::db::models::{NewPlacement, PageSectionWidget, WidgetContentQuery, WidgetContentQueryFilter};
use crate::error::{CmsError, Result};
use crate::query::{ContentFilter, ContentQuery};
use crate::values::FieldValue;

const PLACEMENT_COLUMNS: &str = "id, page_section_id, widget_id, position, x, y, width, height, \
    settings, content_query, css_classes, custom_css";

impl From<WidgetContentQueryFilter> for ContentFilter {
    fn from(row: WidgetContentQueryFilter) -> Self {
        Self {
            field_id: row.field_id,
            field_key: row.field_key,
            operator: row.operator,
            value: row.value,
            condition_group: row.condition_group,
        }
    }
}

impl WidgetContentQuery {
    pub fn into_content_query(self, filters: Vec<WidgetContentQueryFilter>) -> ContentQuery {
        ContentQuery {
            content_type_id: self.content_type_id,
            filters: filters.into_iter().map(ContentFilter::from).collect(),
            order_by: self.order_by,
            order_direction: self.order_direction,
            limit: self.query_limit,
            offset: self.query_offset,
        }
    }
}

/// The widget's normalized query, if it has one.
pub async fn load_query(pool: &SqlitePool, widget: &Widget) -> Result<Option<ContentQuery>> {
    let Some(query_id) = widget.content_query_id else {
        return Ok(None);
    };

    let Some(row) = sqlx::query_as::<_, WidgetContentQuery>(
        "SELECT id, content_type_id, query_limit, query_offset, order_by, order_direction \
         FROM widget_content_queries WHERE id = $1",
    )
    .bind(query_id)
    .fetch_optional(pool)
    .await?
    else {
        warn!(widget_id = widget.id, query_id, "widget points at a missing content query");
        return Ok(None);
    };

    let filters = sqlx::query_as::<_, WidgetContentQueryFilter>(
        "SELECT id, query_id, field_id, field_key, operator, value, condition_group, position \
         FROM widget_content_query_filters WHERE query_id = $1 ORDER BY position ASC, id ASC",
    )
    .bind(query_id)
    .fetch_all(pool)
    .await?;

    Ok(Some(row.into_content_query(filters)))
}

/// Store `query` as the widget's normalized query, replacing its filters,
/// and copy it into the JSON of every placement of the widget.
pub async fn save_query(pool: &SqlitePool, widget_id: i64, query: &ContentQuery) -> Result<i64> {
    let widget = find_widget(pool, widget_id)
        .await?
        .ok_or(CmsError::WidgetNotFound(widget_id))?;
    let json = serde_json::to_string(query)?;
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    let query_id = match widget.content_query_id {
        Some(id) => {
            sqlx::query(
                "UPDATE widget_content_queries SET content_type_id = $1, query_limit = $2, \
                 query_offset = $3, order_by = $4, order_direction = $5, updated_at = $6 \
                 WHERE id = $7",
            )
            .bind(query.content_type_id)
            .bind(query.limit)
            .bind(query.offset)
            .bind(&query.order_by)
            .bind(query.order_direction.as_str())
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
            id
        }
        None => {
            let (id,): (i64,) = sqlx::query_as(
                "INSERT INTO widget_content_queries (content_type_id, query_limit, query_offset, \
                 order_by, order_direction, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $6) RETURNING id",
            )
            .bind(query.content_type_id)
            .bind(query.limit)
            .bind(query.offset)
            .bind(&query.order_by)
            .bind(query.order_direction.as_str())
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
            id
        }
    };

    sqlx::query("DELETE FROM widget_content_query_filters WHERE query_id = $1")
        .bind(query_id)
        .execute(&mut *tx)
        .await?;

    for (position, filter) in query.filters.iter().enumerate() {
        sqlx::query(
            "INSERT INTO widget_content_query_filters \
             (query_id, field_id, field_key, operator, value, condition_group, position) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(query_id)
        .bind(filter.field_id)
        .bind(&filter.field_key)
        .bind(filter.operator.as_str())
        .bind(&filter.value)
        .bind(&filter.condition_group)
        .bind(position as i64)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("UPDATE widgets SET content_query_id = $1, updated_at = $2 WHERE id = $3")
        .bind(query_id)
        .bind(now)
        .bind(widget_id)
        .execute(&mut *tx)
        .await?;

    let synced = sqlx::query(
        "UPDATE page_section_widgets SET content_query = $1, updated_at = $2 WHERE widget_id = $3",
    )
    .bind(&json)
    .bind(now)
    .bind(widget_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        widget_id,
        query_id,
        filters = query.filters.len(),
        placements = synced.rows_affected(),
        "widget content query saved"
    );
    Ok(query_id)
}

/// Detach the widget's query and clear the placement copies.
pub async fn clear_query(pool: &SqlitePool, widget_id: i64) -> Result<()> {
    let widget = find_widget(pool, widget_id)
        .await?
        .ok_or(CmsError::WidgetNotFound(widget_id))?;
    let Some(query_id) = widget.content_query_id else {
        return Ok(());
    };

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM widget_content_query_filters WHERE query_id = $1")
        .bind(query_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM widget_content_queries WHERE id = $1")
        .bind(query_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE widgets SET content_query_id = NULL WHERE id = $1")
        .bind(widget_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE page_section_widgets SET content_query = NULL WHERE widget_id = $1")
        .bind(widget_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    debug!(widget_id, query_id, "widget content query cleared");
    Ok(())
}

pub async fn create_placement(pool: &SqlitePool, placement: &NewPlacement) -> Result<PageSectionWidget> {
    let settings = placement.settings.as_ref().map(serde_json::to_string).transpose()?;
    let content_query = placement
        .content_query
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let now = Utc::now();

    let sql = format!(
        "INSERT INTO page_section_widgets (page_section_id, widget_id, position, x, y, width, \
         height, settings, content_query, css_classes, custom_css, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12) RETURNING {}",
        PLACEMENT_COLUMNS
    );
    let created = sqlx::query_as::<_, PageSectionWidget>(&sql)
        .bind(placement.page_section_id)
        .bind(placement.widget_id)
        .bind(placement.position)
        .bind(placement.x)
        .bind(placement.y)
        .bind(placement.width)
        .bind(placement.height)
        .bind(&settings)
        .bind(&content_query)
        .bind(&placement.css_classes)
        .bind(&placement.custom_css)
        .bind(now)
        .fetch_one(pool)
        .await?;

    debug!(placement_id = created.id, widget_id = created.widget_id, "widget placed");
    Ok(created)
}

pub async fn find_placement(pool: &SqlitePool, id: i64) -> Result<Option<PageSectionWidget>> {
    let sql = format!("SELECT {} FROM page_section_widgets WHERE id = $1", PLACEMENT_COLUMNS);
    let placement = sqlx::query_as::<_, PageSectionWidget>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(placement)
}

/// Placements of a page section in display order.
pub async fn section_placements(
    pool: &SqlitePool,
    page_section_id: i64,
) -> Result<Vec<PageSectionWidget>> {
    let sql = format!(
        "SELECT {} FROM page_section_widgets WHERE page_section_id = $1 ORDER BY position ASC, id ASC",
        PLACEMENT_COLUMNS
    );
    let placements = sqlx::query_as::<_, PageSectionWidget>(&sql)
        .bind(page_section_id)
        .fetch_all(pool)
        .await?;
    Ok(placements)
}

impl PageSectionWidget {
    /// The placement's inline JSON query. Unparsable JSON reads as no query.
    pub fn content_query(&self) -> Option<ContentQuery> {
        let json = self.content_query.as_ref()?;
        if json.0.is_null() {
            return None;
        }
        match serde_json::from_value(json.0.clone()) {
            Ok(query) => Some(query),
            Err(e) => {
                warn!(placement_id = self.id, error = %e, "unreadable placement content query");
                None
            }
        }
    }
}

/// A content item with every field decoded, keyed by slug.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedItem {
    pub item: ContentItem,
    pub fields: BTreeMap<String, FieldValue>,
}

/// Everything a template needs to render one placement.
#[derive(Debug, Clone, Serialize)]
pub struct PlacementContent {
    pub placement: PageSectionWidget,
    pub widget: Widget,
    pub settings: BTreeMap<String, FieldValue>,
    pub items: Vec<ResolvedItem>,
}

/// Resolve a placement to its widget settings and queried items. Missing
/// placements or widgets resolve to `None`; a widget without a query, or one
/// querying a content type it is not allowed to, resolves with no items.
#[tracing::instrument(skip(pool))]
pub async fn resolve_placement(pool: &SqlitePool, placement_id: i64) -> Result<Option<PlacementContent>> {
    let Some(placement) = find_placement(pool, placement_id).await? else {
        debug!("placement not found");
        return Ok(None);
    };
    let Some(widget) = find_widget(pool, placement.widget_id).await? else {
        warn!(widget_id = placement.widget_id, "placement refers to a missing widget");
        return Ok(None);
    };

    let query = match load_query(pool, &widget).await? {
        Some(query) => Some(query),
        None => placement.content_query(),
    };

    let mut items = Vec::new();
    if let Some(query) = query {
        if widget.can_query(pool, query.content_type_id).await? {
            for item in query.execute(pool).await? {
                let fields = item.field_values(pool).await?;
                items.push(ResolvedItem { item, fields });
            }
        } else {
            warn!(
                widget_id = widget.id,
                content_type_id = query.content_type_id,
                "widget is not allowed to query this content type"
            );
        }
    }

    let settings = widget.field_values(pool).await?;
    Ok(Some(PlacementContent {
        placement,
        widget,
        settings,
        items,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::fixtures as content_fixtures;
    use crate::db::test_pool;
    use crate::fields::FieldType;
    use crate::query::{FilterOperator, SortDirection};
    use crate::widgets::fixtures;
    use serde_json::{json, Value};

    fn placement(widget_id: i64, position: i64) -> NewPlacement {
        NewPlacement {
            page_section_id: 1,
            widget_id,
            position,
            width: 12,
            height: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_save_and_load_query() {
        let pool = test_pool().await;
        let widget = fixtures::widget(&pool, None, "feed").await;
        let query = ContentQuery::new(3)
            .filter(ContentFilter::field(9, FilterOperator::In, "a,b"))
            .filter(ContentFilter::property("status", FilterOperator::Equals, "published"))
            .order_by("published_at", SortDirection::Desc)
            .limit(5);

        let query_id = save_query(&pool, widget.id, &query).await.unwrap();
        let widget = find_widget(&pool, widget.id).await.unwrap().unwrap();
        assert_eq!(widget.content_query_id, Some(query_id));
        assert_eq!(load_query(&pool, &widget).await.unwrap(), Some(query));
    }

    #[tokio::test]
    async fn test_resave_replaces_filters_and_syncs_placements() {
        let pool = test_pool().await;
        let widget = fixtures::widget(&pool, None, "feed").await;
        let placed = create_placement(&pool, &placement(widget.id, 0)).await.unwrap();
        assert_eq!(placed.content_query(), None);

        let first = ContentQuery::new(1).filter(ContentFilter::property("title", FilterOperator::Contains, "a"));
        let first_id = save_query(&pool, widget.id, &first).await.unwrap();
        let second = ContentQuery::new(2).limit(3);
        let second_id = save_query(&pool, widget.id, &second).await.unwrap();
        assert_eq!(first_id, second_id);

        let widget = find_widget(&pool, widget.id).await.unwrap().unwrap();
        assert_eq!(load_query(&pool, &widget).await.unwrap(), Some(second.clone()));

        let placed = find_placement(&pool, placed.id).await.unwrap().unwrap();
        assert_eq!(placed.content_query(), Some(second));
    }

    #[tokio::test]
    async fn test_save_query_for_missing_widget() {
        let pool = test_pool().await;
        let result = save_query(&pool, 42, &ContentQuery::new(1)).await;
        assert!(matches!(result, Err(CmsError::WidgetNotFound(42))));
    }

    #[tokio::test]
    async fn test_clear_query() {
        let pool = test_pool().await;
        let widget = fixtures::widget(&pool, None, "feed").await;
        let placed = create_placement(&pool, &placement(widget.id, 0)).await.unwrap();
        save_query(&pool, widget.id, &ContentQuery::new(1)).await.unwrap();

        clear_query(&pool, widget.id).await.unwrap();
        let widget = find_widget(&pool, widget.id).await.unwrap().unwrap();
        assert_eq!(widget.content_query_id, None);
        assert_eq!(load_query(&pool, &widget).await.unwrap(), None);
        let placed = find_placement(&pool, placed.id).await.unwrap().unwrap();
        assert_eq!(placed.content_query(), None);
    }

    #[tokio::test]
    async fn test_section_placements_in_order() {
        let pool = test_pool().await;
        let widget = fixtures::widget(&pool, None, "feed").await;
        let second = create_placement(&pool, &placement(widget.id, 2)).await.unwrap();
        let first = create_placement(&pool, &placement(widget.id, 1)).await.unwrap();

        let ids: Vec<i64> = section_placements(&pool, 1)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_resolve_from_placement_json() {
        let pool = test_pool().await;
        let article = content_fixtures::content_type(&pool, "article").await;
        let rating = content_fixtures::field(&pool, article.id, "rating", FieldType::Number).await;
        for (title, value) in [("A", 5), ("B", 2), ("C", 4)] {
            let item = content_fixtures::item(&pool, article.id, title).await;
            item.set_field_value(&pool, "rating", &json!(value)).await.unwrap();
        }

        let widget = fixtures::widget(&pool, None, "top-rated").await;
        let placed = create_placement(
            &pool,
            &NewPlacement {
                content_query: Some(json!({
                    "contentTypeId": article.id,
                    "filters": [{"fieldId": rating.id, "operator": "greater_than", "value": "3"}],
                    "orderBy": "title",
                    "orderDirection": "desc"
                })),
                ..placement(widget.id, 0)
            },
        )
        .await
        .unwrap();

        let resolved = resolve_placement(&pool, placed.id).await.unwrap().unwrap();
        let titles: Vec<&str> = resolved.items.iter().map(|r| r.item.title.as_str()).collect();
        assert_eq!(titles, vec!["C", "A"]);
        assert_eq!(resolved.items[0].fields["rating"], FieldValue::Number(4.0));
        assert!(resolved.settings.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_respects_allowed_content_types() {
        let pool = test_pool().await;
        let article = content_fixtures::content_type(&pool, "article").await;
        content_fixtures::item(&pool, article.id, "A").await;

        let widget = fixtures::widget(&pool, None, "feed").await;
        widget.allow_content_type(&pool, article.id + 100).await.unwrap();
        save_query(&pool, widget.id, &ContentQuery::new(article.id)).await.unwrap();
        let placed = create_placement(&pool, &placement(widget.id, 0)).await.unwrap();

        let resolved = resolve_placement(&pool, placed.id).await.unwrap().unwrap();
        assert!(resolved.items.is_empty());

        widget.allow_content_type(&pool, article.id).await.unwrap();
        let resolved = resolve_placement(&pool, placed.id).await.unwrap().unwrap();
        assert_eq!(resolved.items.len(), 1);
    }

    fn stored_placement(content_query: Value) -> PageSectionWidget {
        PageSectionWidget {
            id: 9,
            page_section_id: 1,
            widget_id: 1,
            position: 0,
            x: 0,
            y: 0,
            width: 12,
            height: 1,
            settings: None,
            content_query: Some(sqlx::types::Json(content_query)),
            css_classes: None,
            custom_css: None,
        }
    }

    #[test]
    fn test_placement_query_tolerates_nulls_and_loose_types() {
        let query = stored_placement(json!({"contentTypeId": 1, "orderDirection": null}))
            .content_query()
            .unwrap();
        assert_eq!(query.order_direction, SortDirection::Asc);

        let query = stored_placement(json!({"contentTypeId": 1, "limit": "5", "offset": null}))
            .content_query()
            .unwrap();
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.offset, None);

        let query = stored_placement(json!({
            "contentTypeId": 1,
            "filters": [
                {"fieldKey": "title", "operator": "contains", "value": "a", "conditionGroup": 1},
                {"fieldKey": "slug", "operator": null, "value": "b"}
            ]
        }))
        .content_query()
        .unwrap();
        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.filters[0].condition_group.as_deref(), Some("1"));
        assert_eq!(query.filters[1].operator, FilterOperator::Equals);

        let query = stored_placement(json!({"contentTypeId": 1, "filters": null}))
            .content_query()
            .unwrap();
        assert!(query.filters.is_empty());

        assert!(stored_placement(Value::Null).content_query().is_none());
        assert!(stored_placement(json!({"filters": []})).content_query().is_none());
    }

    #[tokio::test]
    async fn test_resolve_missing_placement() {
        let pool = test_pool().await;
        assert!(resolve_placement(&pool, 1).await.unwrap().is_none());
    }
}
