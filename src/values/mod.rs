/*!
 * Field Values
 * Typed view over raw text field storage
 */
pub mod decoder;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Serialize, Serializer};
use serde_json::Value;

pub use crate::db::models::MediaFile;
pub use decoder::{DecodeInput, DecodeTable, CONTENT_DECODERS, WIDGET_DECODERS};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Markup that is embedded as-is when rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SafeHtml(String);

impl SafeHtml {
    pub fn trusted(html: impl Into<String>) -> Self {
        Self(html.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SafeHtml {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Html(SafeHtml),
    Boolean(bool),
    Number(f64),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Json(Value),
    Labels(Vec<String>),
    Media(Vec<MediaFile>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Text as it would be printed in a template; `None` for null and for
    /// structured values.
    pub fn display(&self) -> Option<String> {
        match self {
            FieldValue::Null | FieldValue::Json(_) | FieldValue::Media(_) => None,
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Html(h) => Some(h.to_string()),
            FieldValue::Boolean(b) => Some(b.to_string()),
            FieldValue::Number(n) => Some(n.to_string()),
            FieldValue::Date(d) => Some(d.format(DATE_FORMAT).to_string()),
            FieldValue::Time(t) => Some(t.format(TIME_FORMAT).to_string()),
            FieldValue::DateTime(dt) => Some(dt.format(DATETIME_FORMAT).to_string()),
            FieldValue::Labels(labels) => Some(labels.join(", ")),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Boolean(b) => serializer.serialize_bool(*b),
            FieldValue::Number(n) => serializer.serialize_f64(*n),
            FieldValue::Json(v) => v.serialize(serializer),
            FieldValue::Labels(labels) => labels.serialize(serializer),
            FieldValue::Media(files) => files.serialize(serializer),
            other => serializer.serialize_str(&other.display().unwrap_or_default()),
        }
    }
}

/// Encode a caller-supplied value into the text column. Arrays and objects
/// are stored as JSON, booleans as `1`/`0`.
pub fn to_raw_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}
