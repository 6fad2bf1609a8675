//! Value comparison used by the assertion comparators.
//!
//! `loose_equals` and `strict_equals` are intentionally different algorithms: the loose
//! variant coerces scalars (`"1" == 1`, `true == 1`) and recurses structurally, the strict
//! variant requires identical types at every position.

use serde_json::Value;

const DESCRIBE_LIMIT: usize = 80;

/// Parses the leading numeric part of a value, like `parseFloat` would.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => leading_float(text.trim()),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn leading_float(text: &str) -> Option<f64> {
    if let Ok(parsed) = text.parse::<f64>() {
        return Some(parsed);
    }
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, c) in text.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '.' if !seen_dot => seen_dot = true,
            '0'..='9' => seen_digit = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }
    if !seen_digit {
        return None;
    }
    text[..end].trim_end_matches('.').parse::<f64>().ok()
}

pub fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_equals(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).map_or(false, |y| loose_equals(x, y)))
        }
        (Value::Array(_), _) | (_, Value::Array(_)) => false,
        (Value::Object(_), _) | (_, Value::Object(_)) => false,
        (a, b) => match (to_number(a), to_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

pub fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| strict_equals(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).map_or(false, |y| strict_equals(x, y)))
        }
        _ => false,
    }
}

/// Case and whitespace insensitive comparison, structural for containers.
pub fn like(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::String(a), Value::String(b)) => a.trim().to_lowercase() == b.trim().to_lowercase(),
        (Value::String(_), _) | (_, Value::String(_)) => {
            to_text(left).trim().to_lowercase() == to_text(right).trim().to_lowercase()
        }
        _ => loose_equals(left, right),
    }
}

pub fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(text) => text.contains(to_text(needle).as_str()),
        Value::Array(items) => items.iter().any(|item| loose_equals(item, needle)),
        Value::Object(map) => map.contains_key(to_text(needle).as_str()),
        _ => false,
    }
}

pub fn starts_with(value: &Value, prefix: &Value) -> bool {
    match value {
        Value::String(text) => text.starts_with(to_text(prefix).as_str()),
        Value::Array(items) => items.first().map_or(false, |item| loose_equals(item, prefix)),
        _ => false,
    }
}

pub fn ends_with(value: &Value, suffix: &Value) -> bool {
    match value {
        Value::String(text) => text.ends_with(to_text(suffix).as_str()),
        Value::Array(items) => items.last().map_or(false, |item| loose_equals(item, suffix)),
        _ => false,
    }
}

pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Text form of a value: strings as they are, everything else as JSON.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Short printable form of a value for generated messages.
pub fn describe(value: &Value) -> String {
    let rendered = value.to_string();
    if rendered.chars().count() > DESCRIBE_LIMIT {
        let truncated: String = rendered.chars().take(DESCRIBE_LIMIT).collect();
        format!("{}…", truncated)
    } else {
        rendered
    }
}
