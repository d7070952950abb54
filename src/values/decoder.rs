//! Type-driven decoding of raw field text.
//!
//! A [`DecodeTable`] maps field type names to decode functions. Content
//! fields and widget fields share this decoder and differ only in the table
//! they use; types absent from a table decode to the raw text.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde_json::Value;

use super::{FieldValue, MediaFile, SafeHtml};
use crate::fields::{FieldDefinition, FieldType};

lazy_static::lazy_static! {
    /// Decimal or exponent notation with optional sign and surrounding whitespace
    static ref NUMERIC_REGEX: Regex =
        Regex::new(r"^\s*[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?\s*$").unwrap();
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%H:%M:%S%.f"];

pub fn parse_numeric(raw: &str) -> Option<f64> {
    if !NUMERIC_REGEX.is_match(raw) {
        return None;
    }
    raw.trim().parse().ok()
}

/// Parse a date or datetime in the shapes the admin forms and the database
/// produce. Offsets are dropped, keeping the wall-clock time.
pub fn parse_calendar(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let trimmed = raw.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| parse_calendar(trimmed).map(|dt| dt.time()))
}

pub struct DecodeInput<'a> {
    pub raw: Option<&'a str>,
    pub field: &'a FieldDefinition,
    pub media: &'a [MediaFile],
}

pub type DecodeFn = fn(&DecodeInput<'_>) -> FieldValue;

pub struct DecodeTable {
    name: &'static str,
    entries: &'static [(&'static str, DecodeFn)],
}

impl DecodeTable {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn handles(&self, field_type: &FieldType) -> bool {
        self.entries.iter().any(|(t, _)| *t == field_type.as_str())
    }

    pub fn decode(&self, input: &DecodeInput<'_>) -> FieldValue {
        let field_type = input.field.field_type.as_str();
        match self.entries.iter().find(|(t, _)| *t == field_type) {
            Some((_, decode)) => decode(input),
            None => decode_raw(input),
        }
    }
}

pub static CONTENT_DECODERS: DecodeTable = DecodeTable {
    name: "content",
    entries: &[
        ("date", decode_date),
        ("datetime", decode_datetime),
        ("boolean", decode_boolean),
        ("number", decode_number),
        ("json", decode_json),
        ("repeater", decode_repeater),
    ],
};

pub static WIDGET_DECODERS: DecodeTable = DecodeTable {
    name: "widget",
    entries: &[
        ("wysiwyg", decode_wysiwyg),
        ("date", decode_date),
        ("time", decode_time),
        ("datetime", decode_datetime),
        ("select", decode_choice),
        ("radio", decode_choice),
        ("multiselect", decode_multi_choice),
        ("checkbox", decode_multi_choice),
        ("file", decode_media),
        ("image", decode_media),
    ],
};

fn decode_raw(input: &DecodeInput<'_>) -> FieldValue {
    match input.raw {
        Some(raw) => FieldValue::Text(raw.to_string()),
        None => FieldValue::Null,
    }
}

fn decode_date(input: &DecodeInput<'_>) -> FieldValue {
    let Some(raw) = input.raw else {
        return FieldValue::Null;
    };
    match parse_calendar(raw) {
        Some(dt) => FieldValue::Date(dt.date()),
        None => FieldValue::Text(raw.to_string()),
    }
}

fn decode_datetime(input: &DecodeInput<'_>) -> FieldValue {
    let Some(raw) = input.raw else {
        return FieldValue::Null;
    };
    match parse_calendar(raw) {
        Some(dt) => FieldValue::DateTime(dt),
        None => FieldValue::Text(raw.to_string()),
    }
}

fn decode_time(input: &DecodeInput<'_>) -> FieldValue {
    let Some(raw) = input.raw else {
        return FieldValue::Null;
    };
    match parse_time(raw) {
        Some(t) => FieldValue::Time(t),
        None => FieldValue::Text(raw.to_string()),
    }
}

fn decode_boolean(input: &DecodeInput<'_>) -> FieldValue {
    let truthy = input.raw.is_some_and(|raw| {
        matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "on" | "yes"
        )
    });
    FieldValue::Boolean(truthy)
}

fn decode_number(input: &DecodeInput<'_>) -> FieldValue {
    match input.raw.and_then(parse_numeric) {
        Some(n) => FieldValue::Number(n),
        None => FieldValue::Null,
    }
}

fn decode_json(input: &DecodeInput<'_>) -> FieldValue {
    match input.raw.and_then(|raw| serde_json::from_str::<Value>(raw).ok()) {
        Some(v) => FieldValue::Json(v),
        None => FieldValue::Null,
    }
}

fn decode_repeater(input: &DecodeInput<'_>) -> FieldValue {
    let rows = input
        .raw
        .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
        .filter(Value::is_array)
        .unwrap_or_else(|| Value::Array(Vec::new()));
    FieldValue::Json(rows)
}

fn decode_wysiwyg(input: &DecodeInput<'_>) -> FieldValue {
    FieldValue::Html(SafeHtml::trusted(input.raw.unwrap_or_default()))
}

fn decode_choice(input: &DecodeInput<'_>) -> FieldValue {
    let Some(raw) = input.raw else {
        return FieldValue::Null;
    };
    let label = input.field.option_label(raw).unwrap_or(raw);
    FieldValue::Text(label.to_string())
}

fn decode_multi_choice(input: &DecodeInput<'_>) -> FieldValue {
    let values = input
        .raw
        .and_then(|raw| serde_json::from_str::<Vec<Value>>(raw).ok())
        .unwrap_or_default();

    let labels = values
        .iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .map(|v| input.field.option_label(&v).map(str::to_string).unwrap_or(v))
        .collect();

    FieldValue::Labels(labels)
}

fn decode_media(input: &DecodeInput<'_>) -> FieldValue {
    FieldValue::Media(input.media.to_vec())
}

/// Name of the media collection that holds a file/image field's uploads.
pub fn media_collection(field_type: &FieldType) -> Option<&'static str> {
    match field_type {
        FieldType::File => Some("field_files"),
        FieldType::Image => Some("field_images"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{definition, option};
    use serde_json::json;

    fn decode(table: &DecodeTable, field: &FieldDefinition, raw: Option<&str>) -> FieldValue {
        table.decode(&DecodeInput {
            raw,
            field,
            media: &[],
        })
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(parse_numeric("3.5"), Some(3.5));
        assert_eq!(parse_numeric(" -4 "), Some(-4.0));
        assert_eq!(parse_numeric("1e3"), Some(1000.0));
        assert_eq!(parse_numeric(".5"), Some(0.5));
        assert_eq!(parse_numeric("abc"), None);
        assert_eq!(parse_numeric("4abc"), None);
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("NaN"), None);
    }

    #[test]
    fn test_parse_calendar_shapes() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(13, 30, 0)
            .unwrap();
        assert_eq!(parse_calendar("2024-05-01 13:30:00"), Some(expected));
        assert_eq!(parse_calendar("2024-05-01T13:30"), Some(expected));
        assert_eq!(parse_calendar("2024-05-01T13:30:00+02:00"), Some(expected));
        assert_eq!(
            parse_calendar("2024-05-01").map(|d| d.date()),
            NaiveDate::from_ymd_opt(2024, 5, 1)
        );
        assert_eq!(parse_calendar("yesterday"), None);
    }

    #[test]
    fn test_content_number() {
        let field = definition(1, "Rating", FieldType::Number);
        assert_eq!(decode(&CONTENT_DECODERS, &field, Some("abc")), FieldValue::Null);
        assert_eq!(
            decode(&CONTENT_DECODERS, &field, Some("3.5")),
            FieldValue::Number(3.5)
        );
        assert_eq!(decode(&CONTENT_DECODERS, &field, None), FieldValue::Null);
    }

    #[test]
    fn test_content_repeater_defaults_to_empty_sequence() {
        let field = definition(1, "Slides", FieldType::Repeater);
        assert_eq!(
            decode(&CONTENT_DECODERS, &field, None),
            FieldValue::Json(json!([]))
        );
        assert_eq!(
            decode(&CONTENT_DECODERS, &field, Some("{broken")),
            FieldValue::Json(json!([]))
        );
        assert_eq!(
            decode(&CONTENT_DECODERS, &field, Some(r#"[{"title":"a"}]"#)),
            FieldValue::Json(json!([{ "title": "a" }]))
        );
    }

    #[test]
    fn test_content_dates() {
        let date = definition(1, "Day", FieldType::Date);
        let value = decode(&CONTENT_DECODERS, &date, Some("2024-02-29 18:00:00"));
        assert_eq!(value.display().as_deref(), Some("2024-02-29"));

        let datetime = definition(2, "At", FieldType::Datetime);
        let value = decode(&CONTENT_DECODERS, &datetime, Some("2024-02-29T18:00"));
        assert_eq!(value.display().as_deref(), Some("2024-02-29 18:00:00"));

        assert_eq!(
            decode(&CONTENT_DECODERS, &date, Some("soon")),
            FieldValue::Text("soon".to_string())
        );
    }

    #[test]
    fn test_content_boolean_and_json() {
        let flag = definition(1, "Featured", FieldType::Boolean);
        assert_eq!(decode(&CONTENT_DECODERS, &flag, Some("1")), FieldValue::Boolean(true));
        assert_eq!(decode(&CONTENT_DECODERS, &flag, Some("0")), FieldValue::Boolean(false));
        assert_eq!(decode(&CONTENT_DECODERS, &flag, None), FieldValue::Boolean(false));

        let meta = definition(2, "Meta", FieldType::Json);
        assert_eq!(
            decode(&CONTENT_DECODERS, &meta, Some(r#"{"a":1}"#)),
            FieldValue::Json(json!({ "a": 1 }))
        );
    }

    #[test]
    fn test_content_table_leaves_widget_types_raw() {
        let field = definition(1, "Body", FieldType::Wysiwyg);
        assert!(!CONTENT_DECODERS.handles(&field.field_type));
        assert_eq!(
            decode(&CONTENT_DECODERS, &field, Some("<p>x</p>")),
            FieldValue::Text("<p>x</p>".to_string())
        );
    }

    #[test]
    fn test_widget_select_falls_back_to_raw() {
        let mut field = definition(1, "Layout", FieldType::Select);
        field.options = vec![option("grid", "Grid view", 0)];
        assert_eq!(
            decode(&WIDGET_DECODERS, &field, Some("grid")),
            FieldValue::Text("Grid view".to_string())
        );
        assert_eq!(
            decode(&WIDGET_DECODERS, &field, Some("masonry")),
            FieldValue::Text("masonry".to_string())
        );
    }

    #[test]
    fn test_widget_multiselect_maps_labels_and_tolerates_garbage() {
        let mut field = definition(1, "Sources", FieldType::Multiselect);
        field.options = vec![option("rss", "RSS", 0), option("api", "API", 1)];
        assert_eq!(
            decode(&WIDGET_DECODERS, &field, Some(r#"["api","csv"]"#)),
            FieldValue::Labels(vec!["API".to_string(), "csv".to_string()])
        );
        assert_eq!(
            decode(&WIDGET_DECODERS, &field, Some("not json")),
            FieldValue::Labels(vec![])
        );
        assert_eq!(decode(&WIDGET_DECODERS, &field, None), FieldValue::Labels(vec![]));
    }

    #[test]
    fn test_widget_time_and_wysiwyg() {
        let time = definition(1, "Opens", FieldType::Time);
        assert_eq!(
            decode(&WIDGET_DECODERS, &time, Some("09:15:00")).display().as_deref(),
            Some("09:15")
        );

        let body = definition(2, "Body", FieldType::Wysiwyg);
        assert_eq!(
            decode(&WIDGET_DECODERS, &body, Some("<em>hi</em>")),
            FieldValue::Html(SafeHtml::trusted("<em>hi</em>"))
        );
    }

    #[test]
    fn test_widget_media_uses_attached_collection() {
        let field = definition(1, "Gallery", FieldType::Image);
        let files = vec![MediaFile {
            id: 1,
            collection_name: "field_images".to_string(),
            file_name: "a.png".to_string(),
            mime_type: Some("image/png".to_string()),
            size: 10,
            url: "/media/1/a.png".to_string(),
        }];
        let value = WIDGET_DECODERS.decode(&DecodeInput {
            raw: None,
            field: &field,
            media: &files,
        });
        assert_eq!(value, FieldValue::Media(files));
        assert_eq!(media_collection(&field.field_type), Some("field_images"));
    }
}
