//! Filter evaluation.
//!
//! A filter targets either a dynamic field (by field id) or a built-in
//! content item property (by key, `title` when absent) and applies one
//! comparison operator to its value. Filters compile to SQL predicates
//! over `content_items`; field filters become correlated `EXISTS` checks
//! on the item's live `content_field_values` rows.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite};

use crate::values::decoder::{parse_calendar, parse_numeric};
use crate::values::DATETIME_FORMAT;

pub const DEFAULT_PROPERTY: &str = "title";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FilterOperator {
    #[default]
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "not_equals",
            FilterOperator::Contains => "contains",
            FilterOperator::StartsWith => "starts_with",
            FilterOperator::EndsWith => "ends_with",
            FilterOperator::GreaterThan => "greater_than",
            FilterOperator::LessThan => "less_than",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "not_in",
            FilterOperator::IsNull => "is_null",
            FilterOperator::IsNotNull => "is_not_null",
        }
    }
}

/// Unrecognized operator names fall back to `equals`.
impl From<&str> for FilterOperator {
    fn from(s: &str) -> Self {
        match s {
            "not_equals" => FilterOperator::NotEquals,
            "contains" => FilterOperator::Contains,
            "starts_with" => FilterOperator::StartsWith,
            "ends_with" => FilterOperator::EndsWith,
            "greater_than" => FilterOperator::GreaterThan,
            "less_than" => FilterOperator::LessThan,
            "in" => FilterOperator::In,
            "not_in" => FilterOperator::NotIn,
            "is_null" => FilterOperator::IsNull,
            "is_not_null" => FilterOperator::IsNotNull,
            _ => FilterOperator::Equals,
        }
    }
}

impl From<String> for FilterOperator {
    fn from(s: String) -> Self {
        FilterOperator::from(s.as_str())
    }
}

impl From<FilterOperator> for String {
    fn from(op: FilterOperator) -> Self {
        op.as_str().to_string()
    }
}

/// Columns of a content item that filters and sorting may address by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinProperty {
    Id,
    ContentTypeId,
    Title,
    Slug,
    Status,
    PublishedAt,
    CreatedAt,
    UpdatedAt,
    CreatedBy,
    UpdatedBy,
}

impl BuiltinProperty {
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "id" => Some(BuiltinProperty::Id),
            "content_type_id" => Some(BuiltinProperty::ContentTypeId),
            "title" => Some(BuiltinProperty::Title),
            "slug" => Some(BuiltinProperty::Slug),
            "status" => Some(BuiltinProperty::Status),
            "published_at" => Some(BuiltinProperty::PublishedAt),
            "created_at" => Some(BuiltinProperty::CreatedAt),
            "updated_at" => Some(BuiltinProperty::UpdatedAt),
            "created_by" => Some(BuiltinProperty::CreatedBy),
            "updated_by" => Some(BuiltinProperty::UpdatedBy),
            _ => None,
        }
    }

    /// Sort expression for `ORDER BY`. Text columns sort case-insensitively.
    pub(crate) fn order_expr(&self) -> &'static str {
        match self {
            BuiltinProperty::Id => "id",
            BuiltinProperty::ContentTypeId => "content_type_id",
            BuiltinProperty::Title => "title COLLATE NOCASE",
            BuiltinProperty::Slug => "slug COLLATE NOCASE",
            BuiltinProperty::Status => "status COLLATE NOCASE",
            BuiltinProperty::PublishedAt => "published_at",
            BuiltinProperty::CreatedAt => "created_at",
            BuiltinProperty::UpdatedAt => "updated_at",
            BuiltinProperty::CreatedBy => "created_by_id",
            BuiltinProperty::UpdatedBy => "updated_by_id",
        }
    }

    /// Expression compared by filters. Timestamps compare in
    /// `YYYY-MM-DD HH:MM:SS` form; actor references by actor id.
    pub(crate) fn filter_expr(&self) -> &'static str {
        match self {
            BuiltinProperty::Id => "content_items.id",
            BuiltinProperty::ContentTypeId => "content_items.content_type_id",
            BuiltinProperty::Title => "content_items.title",
            BuiltinProperty::Slug => "content_items.slug",
            BuiltinProperty::Status => "content_items.status",
            BuiltinProperty::PublishedAt => "strftime('%Y-%m-%d %H:%M:%S', content_items.published_at)",
            BuiltinProperty::CreatedAt => "strftime('%Y-%m-%d %H:%M:%S', content_items.created_at)",
            BuiltinProperty::UpdatedAt => "strftime('%Y-%m-%d %H:%M:%S', content_items.updated_at)",
            BuiltinProperty::CreatedBy => "content_items.created_by_id",
            BuiltinProperty::UpdatedBy => "content_items.updated_by_id",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterTarget {
    Field(i64),
    Property(BuiltinProperty),
    Unknown(String),
}

/// One comparison condition of a content query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentFilter {
    #[serde(default, alias = "field_id", deserialize_with = "de_opt_int")]
    pub field_id: Option<i64>,
    #[serde(default, alias = "field_key", deserialize_with = "de_opt_text")]
    pub field_key: Option<String>,
    #[serde(default, deserialize_with = "de_operator")]
    pub operator: FilterOperator,
    #[serde(default, deserialize_with = "de_filter_value")]
    pub value: String,
    #[serde(
        default,
        alias = "condition_group",
        deserialize_with = "de_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub condition_group: Option<String>,
}

impl ContentFilter {
    pub fn field(field_id: i64, operator: FilterOperator, value: impl Into<String>) -> Self {
        Self {
            field_id: Some(field_id),
            operator,
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn property(key: &str, operator: FilterOperator, value: impl Into<String>) -> Self {
        Self {
            field_key: Some(key.to_string()),
            operator,
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn target(&self) -> FilterTarget {
        if let Some(id) = self.field_id {
            return FilterTarget::Field(id);
        }
        let key = self
            .field_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .unwrap_or(DEFAULT_PROPERTY);
        match BuiltinProperty::parse(key) {
            Some(property) => FilterTarget::Property(property),
            None => FilterTarget::Unknown(key.to_string()),
        }
    }

    /// Append ` AND <predicate>` to a query over `content_items`. Filters on
    /// unknown properties append nothing and return `false`.
    pub(crate) fn push_condition(&self, qb: &mut QueryBuilder<'_, Sqlite>) -> bool {
        match self.target() {
            FilterTarget::Field(field_id) => {
                // is_null is the negation of is_not_null, so a missing row and
                // an empty value match alike.
                let (exists, operator) = match self.operator {
                    FilterOperator::IsNull => (" AND NOT EXISTS (", FilterOperator::IsNotNull),
                    op => (" AND EXISTS (", op),
                };
                qb.push(exists)
                    .push(
                        "SELECT 1 FROM content_field_values v \
                         WHERE v.content_item_id = content_items.id \
                         AND v.deleted_at IS NULL AND v.field_id = ",
                    )
                    .push_bind(field_id)
                    .push(" AND ");
                push_predicate(qb, "v.value", operator, &self.value);
                qb.push(")");
                true
            }
            FilterTarget::Property(property) => {
                qb.push(" AND ");
                push_predicate(qb, property.filter_expr(), self.operator, &self.value);
                true
            }
            FilterTarget::Unknown(_) => false,
        }
    }
}

/// A NULL column fails every comparison, so only `is_null` can match it.
fn push_predicate(qb: &mut QueryBuilder<'_, Sqlite>, expr: &str, operator: FilterOperator, operand: &str) {
    match operator {
        FilterOperator::IsNull => {
            qb.push(format!("({0} IS NULL OR {0} = '')", expr));
        }
        FilterOperator::IsNotNull => {
            qb.push(format!("({0} IS NOT NULL AND {0} <> '')", expr));
        }
        FilterOperator::Equals => {
            qb.push(format!("{} = ", expr)).push_bind(operand.to_string());
        }
        FilterOperator::NotEquals => {
            qb.push(format!("{} <> ", expr)).push_bind(operand.to_string());
        }
        FilterOperator::Contains => {
            qb.push(format!("{} LIKE ", expr)).push_bind(format!("%{}%", operand));
        }
        FilterOperator::StartsWith => {
            qb.push(format!("{} LIKE ", expr)).push_bind(format!("{}%", operand));
        }
        FilterOperator::EndsWith => {
            qb.push(format!("{} LIKE ", expr)).push_bind(format!("%{}", operand));
        }
        FilterOperator::In | FilterOperator::NotIn => {
            let keyword = if operator == FilterOperator::In { "IN" } else { "NOT IN" };
            qb.push(format!("{} {} (", expr, keyword));
            let mut candidates = qb.separated(", ");
            for candidate in operand.split(',') {
                candidates.push_bind(candidate.to_string());
            }
            candidates.push_unseparated(")");
        }
        FilterOperator::GreaterThan => push_ordered(qb, expr, ">", operand),
        FilterOperator::LessThan => push_ordered(qb, expr, "<", operand),
    }
}

/// Numeric comparison when the operand is a number, chronological when it
/// is a date; the stored side must have the same shape or the row fails.
fn push_ordered(qb: &mut QueryBuilder<'_, Sqlite>, expr: &str, op: &str, operand: &str) {
    if let Some(number) = parse_numeric(operand) {
        qb.push(format!(
            "({} AND CAST(trim({}) AS REAL) {} ",
            numeric_guard(expr),
            expr,
            op
        ))
        .push_bind(number)
        .push(")");
    } else if let Some(at) = parse_calendar(operand) {
        qb.push(format!(
            "({} AND {} {} ",
            calendar_guard(expr),
            wall_clock(expr),
            op
        ))
        .push_bind(at.format(DATETIME_FORMAT).to_string())
        .push(")");
    } else {
        qb.push("0");
    }
}

/// Plain decimal text: optional leading sign, digits, at most one point.
fn numeric_guard(expr: &str) -> String {
    let t = format!("trim({})", expr);
    format!(
        "({t} <> '' AND {t} NOT GLOB '*[^0-9.+-]*' AND {t} GLOB '*[0-9]*' \
         AND substr({t}, 2) NOT GLOB '*[+-]*' AND {t} NOT GLOB '*.*.*')",
        t = t
    )
}

/// `YYYY-MM-DD` prefix that SQLite can read as a date.
fn calendar_guard(expr: &str) -> String {
    format!(
        "(substr(trim({e}), 1, 10) GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]' \
         AND {wall} IS NOT NULL)",
        e = expr,
        wall = wall_clock(expr)
    )
}

/// Date and time without offset or fractional seconds, as written.
fn wall_clock(expr: &str) -> String {
    format!("datetime(substr(trim({}), 1, 19))", expr)
}

pub(crate) fn de_opt_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn de_opt_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn de_operator<'de, D: Deserializer<'de>>(deserializer: D) -> Result<FilterOperator, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => FilterOperator::from(s),
        _ => FilterOperator::default(),
    })
}

/// Filter values arrive as strings, numbers, or (for `in`/`not_in`) arrays;
/// arrays are folded into the comma-separated form.
fn de_filter_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    fn scalar(v: &Value) -> String {
        match v {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.iter().map(scalar).collect::<Vec<_>>().join(","),
        other => scalar(&other),
    })
}
