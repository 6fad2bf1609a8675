//! Structural validation of a value against a template.
//!
//! A template is plain JSON: string leaves name the accepted type (`"string"`, `"number"`,
//! `"integer"`, `"boolean"`, `"null"`, `"array"`, `"object"`, `"any"`, or a union such as
//! `"string|null"`), objects list required keys (a trailing `?` marks a key optional) and a
//! single element array validates every element of the actual array.

use crate::assertion::compare::{strict_equals, type_name};
use serde_json::Value;

/// Returns every mismatch found, empty when the value fits the template.
pub fn validate(template: &Value, value: &Value) -> Vec<String> {
    let mut errors = vec![];
    check(template, value, "$", &mut errors);
    errors
}

fn check(template: &Value, value: &Value, path: &str, errors: &mut Vec<String>) {
    match template {
        Value::String(types) => {
            if !types.split('|').any(|kind| type_matches(kind.trim(), value)) {
                errors.push(format!(
                    "{} should be {} but is {}",
                    path,
                    types,
                    type_name(value)
                ));
            }
        }
        Value::Object(fields) => {
            let actual = match value {
                Value::Object(actual) => actual,
                other => {
                    errors.push(format!("{} should be object but is {}", path, type_name(other)));
                    return;
                }
            };
            for (key, field_template) in fields {
                let (name, optional) = match key.strip_suffix('?') {
                    Some(name) => (name, true),
                    None => (key.as_str(), false),
                };
                let child_path = format!("{}.{}", path, name);
                match actual.get(name) {
                    Some(child) => check(field_template, child, &child_path, errors),
                    None if optional => {}
                    None => errors.push(format!("{} is missing", child_path)),
                }
            }
        }
        Value::Array(items) => {
            let actual = match value {
                Value::Array(actual) => actual,
                other => {
                    errors.push(format!("{} should be array but is {}", path, type_name(other)));
                    return;
                }
            };
            if let Some(item_template) = items.first() {
                for (index, item) in actual.iter().enumerate() {
                    check(item_template, item, &format!("{}[{}]", path, index), errors);
                }
            }
        }
        literal => {
            if !strict_equals(literal, value) {
                errors.push(format!("{} should be {} but is {}", path, literal, value));
            }
        }
    }
}

fn type_matches(kind: &str, value: &Value) -> bool {
    match kind {
        "any" | "*" => true,
        "integer" => value.as_i64().is_some() || value.as_u64().is_some(),
        other => other == type_name(value),
    }
}
