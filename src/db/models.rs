//! Database Models - structs representing database tables (used by sqlx/serde).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{sqlite::SqliteRow, types::Json, FromRow, Row};

use crate::actor::ActorRef;
use crate::content::ContentStatus;
use crate::fields::{FieldOption, FieldType};
use crate::query::{FilterOperator, SortDirection};

/// Content type model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentType {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Field definition, shared by content-type fields and widget-type fields.
/// `owner_id` is the content type or widget type the field belongs to.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub slug: String,
    #[sqlx(try_from = "String")]
    pub field_type: FieldType,
    pub is_required: bool,
    pub is_unique: bool,
    pub position: i64,
    pub validation_rules: Option<String>,
    pub settings: Option<Json<Value>>,
    #[sqlx(skip)]
    #[serde(default)]
    pub options: Vec<FieldOption>,
}

/// New field for insertion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewField {
    pub owner_id: i64,
    pub name: String,
    pub slug: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub position: i64,
    pub validation_rules: Option<String>,
    pub settings: Option<Value>,
}

/// Content item model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: i64,
    pub content_type_id: i64,
    pub title: String,
    pub slug: String,
    pub status: ContentStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub created_by: Option<ActorRef>,
    pub updated_by: Option<ActorRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for ContentItem {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            content_type_id: row.try_get("content_type_id")?,
            title: row.try_get("title")?,
            slug: row.try_get("slug")?,
            status: ContentStatus::from(status),
            published_at: row.try_get("published_at")?,
            created_by: ActorRef::from_columns(
                row.try_get("created_by_type")?,
                row.try_get("created_by_id")?,
            ),
            updated_by: ActorRef::from_columns(
                row.try_get("updated_by_type")?,
                row.try_get("updated_by_id")?,
            ),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// New content item for creation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContentItem {
    pub content_type_id: i64,
    pub title: String,
    pub slug: String,
    pub status: Option<ContentStatus>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_by: Option<ActorRef>,
}

/// Raw stored value of one content field
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentFieldValue {
    pub id: i64,
    pub content_item_id: i64,
    pub field_id: i64,
    pub value: Option<String>,
}

/// Widget type model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetType {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

/// Widget model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: i64,
    pub theme_id: Option<i64>,
    pub widget_type_id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub view_path: Option<String>,
    pub content_query_id: Option<i64>,
    pub created_by: Option<ActorRef>,
    pub updated_by: Option<ActorRef>,
}

impl<'r> FromRow<'r, SqliteRow> for Widget {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            theme_id: row.try_get("theme_id")?,
            widget_type_id: row.try_get("widget_type_id")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            view_path: row.try_get("view_path")?,
            content_query_id: row.try_get("content_query_id")?,
            created_by: ActorRef::from_columns(
                row.try_get("created_by_type")?,
                row.try_get("created_by_id")?,
            ),
            updated_by: ActorRef::from_columns(
                row.try_get("updated_by_type")?,
                row.try_get("updated_by_id")?,
            ),
        })
    }
}

/// New widget for creation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWidget {
    pub theme_id: Option<i64>,
    pub widget_type_id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub view_path: Option<String>,
    pub created_by: Option<ActorRef>,
}

/// Raw stored value of one widget configuration field
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetFieldValue {
    pub id: i64,
    pub widget_id: i64,
    pub field_id: i64,
    pub value: Option<String>,
}

/// Normalized content query row
#[derive(Debug, Clone, FromRow)]
pub struct WidgetContentQuery {
    pub id: i64,
    pub content_type_id: i64,
    pub query_limit: Option<i64>,
    pub query_offset: Option<i64>,
    pub order_by: Option<String>,
    #[sqlx(try_from = "String")]
    pub order_direction: SortDirection,
}

/// One filter row of a normalized content query
#[derive(Debug, Clone, FromRow)]
pub struct WidgetContentQueryFilter {
    pub id: i64,
    pub query_id: i64,
    pub field_id: Option<i64>,
    pub field_key: Option<String>,
    #[sqlx(try_from = "String")]
    pub operator: FilterOperator,
    pub value: String,
    pub condition_group: Option<String>,
    pub position: i64,
}

/// A widget placed inside a page section
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSectionWidget {
    pub id: i64,
    pub page_section_id: i64,
    pub widget_id: i64,
    pub position: i64,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub settings: Option<Json<Value>>,
    pub content_query: Option<Json<Value>>,
    pub css_classes: Option<String>,
    pub custom_css: Option<String>,
}

/// New placement for insertion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlacement {
    pub page_section_id: i64,
    pub widget_id: i64,
    pub position: i64,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub settings: Option<Value>,
    pub content_query: Option<Value>,
    pub css_classes: Option<String>,
    pub custom_css: Option<String>,
}

/// Descriptor of one attached media file
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    pub id: i64,
    pub collection_name: String,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub size: i64,
    pub url: String,
}

/// New media descriptor for insertion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMedia {
    pub model_type: String,
    pub model_id: i64,
    pub collection_name: String,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub size: i64,
    pub url: String,
}
