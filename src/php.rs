//! PHP literal and identifier rendering.

use serde_json::Value;

pub fn variable(name: &str) -> String {
    format!("${}", name)
}

/// Single-quoted PHP string.
pub fn string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

pub fn number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Renders a JSON default value as a PHP literal.
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => string_literal(s),
        Value::Array(items) => {
            if items.is_empty() {
                return "array()".to_string();
            }
            let items: Vec<String> = items.iter().map(literal).collect();
            format!("array( {} )", items.join(", "))
        }
        Value::Object(map) => {
            if map.is_empty() {
                return "array()".to_string();
            }
            let entries: Vec<String> = map
                .iter()
                .map(|(key, value)| format!("{} => {}", string_literal(key), literal(value)))
                .collect();
            format!("array( {} )", entries.join(", "))
        }
    }
}
