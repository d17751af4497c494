//! Primitive extractors for numbers, indices, body parts and media.
//!
//! Inputs come either from JSON payloads or from raw `data-*` attribute
//! strings. Nothing here fails: unusable input yields `None` or an empty list.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::types::{BodyPartVolume, ExerciseMedia};

static FLOAT_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?").expect("valid float regex")
});

/// Parse the leading float of a string, the way lenient form inputs are read.
///
/// `"180"` and `"180s"` both give 180. Non-finite results are absent.
pub fn parse_float_prefix(raw: &str) -> Option<f64> {
    let m = FLOAT_PREFIX.find(raw.trim_start())?;
    m.as_str().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Read a number from a JSON number or a numeric-looking string
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|n| n.is_finite()),
        Value::String(s) => parse_float_prefix(s),
        _ => None,
    }
}

/// Read a non-negative whole index from a JSON number or a fully numeric string.
///
/// Unlike `parse_number`, trailing text is rejected, so uuids and dates are
/// never read as indices.
pub fn parse_index(value: &Value) -> Option<usize> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !n.is_finite() || n < 0.0 || n.fract() != 0.0 {
        return None;
    }
    if n < 0.0 || n.fract() != 0.0 {
        return None;
    }
    Some(n as usize)
}

/// Read a non-empty string; numbers are rendered to text
pub fn parse_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First non-empty string under any of `keys`
pub fn first_text(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| record.get(*k).and_then(parse_text))
}

/// Decode a value that may be an embedded JSON document (as found in `data-*` attributes)
fn as_json_list(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items.clone()),
        Value::String(raw) => match serde_json::from_str::<Value>(raw.trim()) {
            Ok(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

/// Parse `[{body_part_name, body_volume}]` from a JSON value or JSON string.
///
/// Entries without a name are dropped; `volume` is set only when it parses
/// to a finite number.
pub fn parse_body_parts(value: &Value) -> Vec<BodyPartVolume> {
    let Some(items) = as_json_list(value) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(obj) => {
                let name = first_text(obj, &["body_part_name", "name", "body_part"])?;
                let volume = ["body_volume", "volume"]
                    .iter()
                    .find_map(|k| obj.get(*k).and_then(parse_number));
                Some(BodyPartVolume { name, volume })
            }
            Value::String(s) if !s.trim().is_empty() => Some(BodyPartVolume {
                name: s.trim().to_string(),
                volume: None,
            }),
            _ => None,
        })
        .collect()
}

/// Parse the raw `data-bodypart` attribute
pub fn parse_body_parts_attr(raw: &str) -> Vec<BodyPartVolume> {
    parse_body_parts(&Value::String(raw.to_string()))
}

/// Parse a media list: objects with a URL field, or bare URL strings
pub fn parse_media(value: &Value) -> Vec<ExerciseMedia> {
    let Some(items) = as_json_list(value) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(obj) => {
                let url = first_text(obj, &["url", "media_url", "file_url", "src", "link"])?;
                Some(ExerciseMedia {
                    url,
                    kind: first_text(obj, &["type", "media_type"]),
                    thumbnail: first_text(obj, &["thumbnail", "thumbnail_url", "thumb"]),
                })
            }
            Value::String(s) if !s.trim().is_empty() => Some(ExerciseMedia {
                url: s.trim().to_string(),
                kind: None,
                thumbnail: None,
            }),
            _ => None,
        })
        .collect()
}

/// Parse the raw `data-media` attribute
pub fn parse_media_attr(raw: &str) -> Vec<ExerciseMedia> {
    parse_media(&Value::String(raw.to_string()))
}

/// `None` for an empty list, so absent and empty serialize the same way
pub fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}
