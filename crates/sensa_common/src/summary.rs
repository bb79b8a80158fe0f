//! Human-readable rendering of a single sensor reading.

use serde_json::{Map, Value};

/// Unit suffix heuristics, checked in order; the last matching key fragment wins
const UNIT_HINTS: &[(&str, &str)] = &[
    ("temp", "°C"),
    ("humidity", "%"),
    ("pressure", "hPa"),
    ("tvoc", " ppb"),
    ("eco2", " ppm"),
];

/// Summarize a reading's `data` object.
///
/// Nested objects become labelled sections, scalars get unit suffixes from
/// their key name, nulls read "not available". Arrays and booleans are
/// skipped. Sections are separated by a blank line.
pub fn summarize_reading(data: &Map<String, Value>) -> String {
    let mut parts = Vec::new();

    for (key, value) in data {
        match value {
            Value::Object(inner) => parts.push(format_section(key, inner)),
            Value::Number(_) | Value::String(_) => {
                parts.push(format!(
                    "{}: {}{}",
                    capitalize(key),
                    format_scalar(value),
                    unit_for(key)
                ));
            }
            Value::Null => parts.push(format!("{}: not available", capitalize(key))),
            Value::Bool(_) | Value::Array(_) => {}
        }
    }

    parts.join("\n\n")
}

fn format_section(label: &str, fields: &Map<String, Value>) -> String {
    let mut section = format!("{}:", capitalize(label));
    for (key, value) in fields {
        section.push_str(&format!("\n  {}: {}", capitalize(key), format_scalar(value)));
    }
    section
}

/// Numbers (and numeric strings) to two decimals, anything else verbatim
fn format_scalar(value: &Value) -> String {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) => format!("{:.2}", f),
            None => n.to_string(),
        },
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => format!("{:.2}", f),
            _ => s.clone(),
        },
        Value::Null => "not available".to_string(),
        other => other.to_string(),
    }
}

fn unit_for(key: &str) -> &'static str {
    let key = key.to_lowercase();
    UNIT_HINTS
        .iter()
        .filter(|(fragment, _)| key.contains(fragment))
        .map(|(_, unit)| *unit)
        .last()
        .unwrap_or("")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
