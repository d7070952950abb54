/*!
 * Content Query
 * Executes widget content queries: scope by content type, filter, order, paginate
 */
pub mod filter;

pub use filter::{BuiltinProperty, ContentFilter, FilterOperator, FilterTarget};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, warn};

use crate::content::{self, ContentItem, ITEM_COLUMNS};
use crate::error::Result;
use filter::de_opt_int;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Anything other than `desc` (any case) sorts ascending.
impl From<String> for SortDirection {
    fn from(s: String) -> Self {
        if s.trim().eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }
}

impl From<SortDirection> for String {
    fn from(d: SortDirection) -> Self {
        d.as_str().to_string()
    }
}

/// A declarative query over the items of one content type.
///
/// Deserialization is forgiving: apart from `contentTypeId`, null or
/// mistyped keys fall back to their defaults and malformed filters are
/// dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentQuery {
    #[serde(alias = "content_type_id", deserialize_with = "de_id")]
    pub content_type_id: i64,
    #[serde(default, deserialize_with = "de_filters")]
    pub filters: Vec<ContentFilter>,
    #[serde(default, alias = "order_by", deserialize_with = "de_order_by")]
    pub order_by: Option<String>,
    #[serde(default, alias = "order_direction", deserialize_with = "de_direction")]
    pub order_direction: SortDirection,
    #[serde(default, deserialize_with = "de_opt_int")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_int")]
    pub offset: Option<i64>,
}

fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    use serde::de::Error;
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().ok_or_else(|| D::Error::custom("content type id out of range")),
        Value::String(s) => s.trim().parse().map_err(D::Error::custom),
        other => Err(D::Error::custom(format!("invalid content type id: {}", other))),
    }
}

fn de_filters<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<ContentFilter>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(filter) => Some(filter),
                Err(e) => {
                    warn!(error = %e, "dropping malformed filter");
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn de_order_by<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn de_direction<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<SortDirection, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => SortDirection::from(s),
        _ => SortDirection::default(),
    })
}

impl ContentQuery {
    pub fn new(content_type_id: i64) -> Self {
        Self {
            content_type_id,
            ..Default::default()
        }
    }

    pub fn filter(mut self, filter: ContentFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, key: &str, direction: SortDirection) -> Self {
        self.order_by = Some(key.to_string());
        self.order_direction = direction;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Run the query. All filters must hold; offset then limit are applied
    /// to the ordered matches. A missing content type yields no items.
    #[tracing::instrument(skip(self, pool), fields(content_type_id = self.content_type_id))]
    pub async fn execute(&self, pool: &SqlitePool) -> Result<Vec<ContentItem>> {
        if !self.content_type_exists(pool).await? {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
        qb.push(ITEM_COLUMNS);
        self.push_scope(&mut qb);
        qb.push(" ORDER BY ").push(self.order_clause());

        let limit = self.limit.filter(|l| *l > 0);
        let offset = self.offset.filter(|o| *o > 0);
        if limit.is_some() || offset.is_some() {
            // SQLite only accepts OFFSET after a LIMIT; -1 is unbounded.
            qb.push(" LIMIT ").push_bind(limit.unwrap_or(-1));
            if let Some(offset) = offset {
                qb.push(" OFFSET ").push_bind(offset);
            }
        }

        let items = qb.build_query_as::<ContentItem>().fetch_all(pool).await?;
        debug!(returned = items.len(), "content query executed");
        Ok(items)
    }

    /// Number of items matching the filters, ignoring offset and limit.
    pub async fn count(&self, pool: &SqlitePool) -> Result<usize> {
        if !self.content_type_exists(pool).await? {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*)");
        self.push_scope(&mut qb);
        let (count,): (i64,) = qb.build_query_as().fetch_one(pool).await?;
        Ok(count.max(0) as usize)
    }

    async fn content_type_exists(&self, pool: &SqlitePool) -> Result<bool> {
        let found = content::find_content_type(pool, self.content_type_id).await?.is_some();
        if !found {
            debug!(content_type_id = self.content_type_id, "content type not found");
        }
        Ok(found)
    }

    /// `FROM` and `WHERE`: live items of the content type passing every filter.
    fn push_scope(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" FROM content_items WHERE content_items.content_type_id = ")
            .push_bind(self.content_type_id)
            .push(" AND content_items.deleted_at IS NULL");

        for filter in &self.filters {
            if !filter.push_condition(qb) {
                if let FilterTarget::Unknown(key) = filter.target() {
                    warn!(key = %key, "ignoring filter on unknown property");
                }
            }
        }
    }

    fn order_clause(&self) -> String {
        let key = self.order_by.as_deref().filter(|k| !k.is_empty());
        match key.map(|k| (k, BuiltinProperty::parse(k))) {
            Some((_, Some(BuiltinProperty::Id))) => format!("id {}", self.order_direction.sql()),
            Some((_, Some(property))) => format!(
                "{} {}, id ASC",
                property.order_expr(),
                self.order_direction.sql()
            ),
            Some((k, None)) => {
                warn!(order_by = %k, "ignoring unknown order key");
                "id ASC".to_string()
            }
            None => "id ASC".to_string(),
        }
    }
}
