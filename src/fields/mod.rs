/*!
 * Field Definitions
 * Field types, choice options and rule parsing shared by content-type fields
 * and widget-type fields
 */
pub mod registry;
pub mod rules;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub use crate::db::models::{FieldDefinition, NewField};
pub use registry::FieldScope;

/// Declared type of a field. Names outside the known set are kept verbatim
/// in `Other` and behave like plain text everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Text,
    Textarea,
    Wysiwyg,
    Email,
    Url,
    Number,
    Boolean,
    Date,
    Time,
    Datetime,
    Select,
    Radio,
    Multiselect,
    Checkbox,
    File,
    Image,
    Json,
    Repeater,
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Wysiwyg => "wysiwyg",
            FieldType::Email => "email",
            FieldType::Url => "url",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Datetime => "datetime",
            FieldType::Select => "select",
            FieldType::Radio => "radio",
            FieldType::Multiselect => "multiselect",
            FieldType::Checkbox => "checkbox",
            FieldType::File => "file",
            FieldType::Image => "image",
            FieldType::Json => "json",
            FieldType::Repeater => "repeater",
            FieldType::Other(name) => name,
        }
    }

    /// Types whose values are constrained to an option set.
    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            FieldType::Select | FieldType::Radio | FieldType::Multiselect | FieldType::Checkbox
        )
    }

    /// Choice types that hold several values at once.
    pub fn is_multi_choice(&self) -> bool {
        matches!(self, FieldType::Multiselect | FieldType::Checkbox)
    }
}

impl From<&str> for FieldType {
    fn from(s: &str) -> Self {
        match s {
            "text" => FieldType::Text,
            "textarea" => FieldType::Textarea,
            "wysiwyg" => FieldType::Wysiwyg,
            "email" => FieldType::Email,
            "url" => FieldType::Url,
            "number" => FieldType::Number,
            "boolean" => FieldType::Boolean,
            "date" => FieldType::Date,
            "time" => FieldType::Time,
            "datetime" => FieldType::Datetime,
            "select" => FieldType::Select,
            "radio" => FieldType::Radio,
            "multiselect" => FieldType::Multiselect,
            "checkbox" => FieldType::Checkbox,
            "file" => FieldType::File,
            "image" => FieldType::Image,
            "json" => FieldType::Json,
            "repeater" => FieldType::Repeater,
            other => FieldType::Other(other.to_string()),
        }
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        FieldType::from(s.as_str())
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a choice field's option set
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOption {
    pub value: String,
    pub label: String,
    pub order_index: i64,
}

impl FieldDefinition {
    /// Split the pipe-delimited rule string into its tokens.
    pub fn validation_rules_array(&self) -> Vec<String> {
        split_rules(self.validation_rules.as_deref())
    }

    pub fn is_type(&self, field_type: &str) -> bool {
        self.field_type.as_str() == field_type
    }

    /// Label of the option whose stored value is `value`.
    pub fn option_label(&self, value: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.value == value)
            .map(|o| o.label.as_str())
    }

    pub fn option_values(&self) -> Vec<&str> {
        self.options.iter().map(|o| o.value.as_str()).collect()
    }
}

pub fn split_rules(rules: Option<&str>) -> Vec<String> {
    rules
        .unwrap_or_default()
        .split('|')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
pub(crate) fn definition(id: i64, name: &str, field_type: FieldType) -> FieldDefinition {
    FieldDefinition {
        id,
        owner_id: 1,
        name: name.to_string(),
        slug: name.to_lowercase().replace(' ', "_"),
        field_type,
        is_required: false,
        is_unique: false,
        position: 0,
        validation_rules: None,
        settings: None,
        options: Vec::new(),
    }
}

#[cfg(test)]
pub(crate) fn option(value: &str, label: &str, order_index: i64) -> FieldOption {
    FieldOption {
        value: value.to_string(),
        label: label.to_string(),
        order_index,
    }
}
