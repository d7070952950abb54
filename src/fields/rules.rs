//! Validation rule assembly.
//!
//! Rules are emitted as metadata for an external validator: a base
//! presence rule, then the rules implied by the field type, then the
//! field's own pipe-delimited rules.

use serde::Serialize;
use std::collections::BTreeMap;

use super::{FieldDefinition, FieldType};

/// Values and rule lists keyed by field display name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationRules {
    pub data: BTreeMap<String, serde_json::Value>,
    pub rules: BTreeMap<String, Vec<String>>,
}

fn presence_rule(field: &FieldDefinition) -> String {
    if field.is_required {
        "required".to_string()
    } else {
        "nullable".to_string()
    }
}

fn in_rule(field: &FieldDefinition) -> Option<String> {
    if field.options.is_empty() {
        return None;
    }
    Some(format!("in:{}", field.option_values().join(",")))
}

fn type_rules(field: &FieldDefinition) -> Vec<String> {
    let mut rules = Vec::new();
    match field.field_type {
        FieldType::Email => rules.push("email".to_string()),
        FieldType::Url => rules.push("url".to_string()),
        FieldType::Number => rules.push("numeric".to_string()),
        FieldType::Date | FieldType::Datetime => rules.push("date".to_string()),
        FieldType::Time => rules.push("date_format:H:i".to_string()),
        FieldType::Select | FieldType::Radio => rules.extend(in_rule(field)),
        FieldType::Multiselect | FieldType::Checkbox => {
            rules.push("array".to_string());
            rules.extend(in_rule(field));
        }
        FieldType::File => rules.push("file".to_string()),
        FieldType::Image => rules.push("image".to_string()),
        _ => {}
    }
    rules
}

/// Ordered rule list for a widget configuration field.
pub fn widget_rules(field: &FieldDefinition) -> Vec<String> {
    let mut rules = vec![presence_rule(field)];
    rules.extend(type_rules(field));
    rules.extend(field.validation_rules_array());
    rules
}

/// Ordered rule list for a content-type field. Unique fields carry an extra
/// `unique` marker ahead of the custom rules.
pub fn content_rules(field: &FieldDefinition) -> Vec<String> {
    let mut rules = vec![presence_rule(field)];
    rules.extend(type_rules(field));
    if field.is_unique {
        rules.push("unique".to_string());
    }
    rules.extend(field.validation_rules_array());
    rules
}

pub(crate) fn single(
    field: &FieldDefinition,
    value: serde_json::Value,
    rules: Vec<String>,
) -> ValidationRules {
    let mut out = ValidationRules::default();
    out.data.insert(field.name.clone(), value);
    out.rules.insert(field.name.clone(), rules);
    out
}

impl FieldDefinition {
    pub fn validation_rules_for_content(&self, value: serde_json::Value) -> ValidationRules {
        single(self, value, content_rules(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{definition, option};

    #[test]
    fn test_optional_text_is_nullable_only() {
        let field = definition(1, "Subtitle", FieldType::Text);
        assert_eq!(widget_rules(&field), vec!["nullable"]);
    }

    #[test]
    fn test_custom_rules_come_last() {
        let mut field = definition(1, "Count", FieldType::Number);
        field.is_required = true;
        field.validation_rules = Some("min:1|max:12".to_string());
        assert_eq!(
            widget_rules(&field),
            vec!["required", "numeric", "min:1", "max:12"]
        );
    }

    #[test]
    fn test_multiselect_rules_include_array_and_options() {
        let mut field = definition(1, "Tags", FieldType::Checkbox);
        field.options = vec![option("a", "A", 0), option("b", "B", 1)];
        assert_eq!(widget_rules(&field), vec!["nullable", "array", "in:a,b"]);
    }

    #[test]
    fn test_choice_without_options_skips_in_rule() {
        let field = definition(1, "Layout", FieldType::Select);
        assert_eq!(widget_rules(&field), vec!["nullable"]);
    }

    #[test]
    fn test_unknown_type_adds_nothing() {
        let field = definition(1, "Color", FieldType::from("colorpicker"));
        assert_eq!(widget_rules(&field), vec!["nullable"]);
    }

    #[test]
    fn test_content_rules_mark_unique() {
        let mut field = definition(1, "Code", FieldType::Text);
        field.is_required = true;
        field.is_unique = true;
        field.validation_rules = Some("max:8".to_string());
        assert_eq!(content_rules(&field), vec!["required", "unique", "max:8"]);
    }
}
