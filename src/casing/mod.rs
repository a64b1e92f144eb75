//! Key-casing translation at the wire boundary.
//!
//! The backend speaks snake_case, in-process code speaks camelCase. These
//! transforms convert object keys recursively in both directions; values are
//! never touched. Both functions are total over any JSON value.

use crate::client::{FormData, FormValue};
use serde_json::{Map, Value};

/// Convert a camelCase key to snake_case.
///
/// Each ASCII uppercase letter becomes an underscore followed by its
/// lowercase form. No acronym normalization happens on purpose: the wire
/// format must round-trip exactly, so `aBTest` becomes `a_b_test` and back.
pub fn snake_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Convert a snake_case key to camelCase.
///
/// An underscore followed by a lowercase ASCII letter collapses into the
/// uppercase letter; any other underscore is kept as-is.
pub fn camel_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '_' {
            if let Some(&next) = chars.peek() {
                if next.is_ascii_lowercase() {
                    chars.next();
                    out.push(next.to_ascii_uppercase());
                    continue;
                }
            }
            out.push('_');
        } else {
            out.push(ch);
        }
    }
    out
}

/// Rewrite all object keys in a JSON tree from camelCase to snake_case.
pub fn keys_to_snake_case(value: Value) -> Value {
    transform_keys(value, &snake_key)
}

/// Rewrite all object keys in a JSON tree from snake_case to camelCase.
pub fn keys_to_camel_case(value: Value) -> Value {
    transform_keys(value, &camel_key)
}

/// Convert multipart form field names to snake_case. File contents and text
/// values pass through untouched.
pub fn form_keys_to_snake_case(form: FormData) -> FormData {
    FormData::from_fields(
        form.into_fields()
            .into_iter()
            .map(|(name, value)| (snake_key(&name), value))
            .collect::<Vec<(String, FormValue)>>(),
    )
}

fn transform_keys(value: Value, convert: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, inner) in map {
                out.insert(convert(&key), transform_keys(inner, convert));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| transform_keys(item, convert))
                .collect(),
        ),
        // strings, numbers, booleans, null: opaque leaves
        other => other,
    }
}
