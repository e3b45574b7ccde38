//! JSON document helpers shared by the compiler and the store backends
//!
//! Dotted paths (`hostingEnvironments.ocpSubDomain`) traverse nested objects
//! and fan out across arrays, the way document stores resolve them.

use serde_json::{Map, Value as JsonValue};
use std::cmp::Ordering;

/// A stored document: a JSON object.
pub type Document = Map<String, JsonValue>;

/// Store-internal id field.
pub const ID_FIELD: &str = "_id";

/// Trailing segment of a dotted path (`categories.name` -> `name`).
pub fn trailing_segment(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

/// True when `path` is `prefix` itself or lies underneath it.
pub fn is_under(path: &str, prefix: &str) -> bool {
    path == prefix
        || (path.len() > prefix.len()
            && path.starts_with(prefix)
            && path.as_bytes()[prefix.len()] == b'.')
}

/// Every value reachable at `path`; arrays on the way are fanned out.
///
/// A terminal array is returned as one value; use [`match_candidates`] to
/// also compare against its elements.
pub fn resolve_values<'a>(doc: &'a JsonValue, path: &str) -> Vec<&'a JsonValue> {
    let mut current = vec![doc];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                JsonValue::Object(map) => {
                    if let Some(v) = map.get(segment) {
                        next.push(v);
                    }
                }
                JsonValue::Array(items) => {
                    for item in items {
                        if let JsonValue::Object(map) = item {
                            if let Some(v) = map.get(segment) {
                                next.push(v);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        if next.is_empty() {
            return next;
        }
        current = next;
    }
    current
}

/// Values a predicate compares against: resolved values plus the elements of
/// any terminal array.
pub fn match_candidates<'a>(doc: &'a JsonValue, path: &str) -> Vec<&'a JsonValue> {
    let mut out = Vec::new();
    for value in resolve_values(doc, path) {
        if let JsonValue::Array(items) = value {
            out.extend(items.iter());
        }
        out.push(value);
    }
    out
}

/// Single-valued field reference as used by expressions (`"$a.b"`).
///
/// Traversing an array of objects yields an array of the nested values.
/// Returns `None` when the path is missing.
pub fn get_path(value: &JsonValue, path: &str) -> Option<JsonValue> {
    let segments: Vec<&str> = path.split('.').collect();
    get_segments(value, &segments)
}

fn get_segments(value: &JsonValue, segments: &[&str]) -> Option<JsonValue> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(value.clone());
    };
    match value {
        JsonValue::Object(map) => map.get(*first).and_then(|v| get_segments(v, rest)),
        JsonValue::Array(items) => {
            let collected: Vec<JsonValue> = items
                .iter()
                .filter_map(|item| match item {
                    JsonValue::Object(_) => get_segments(item, segments),
                    _ => None,
                })
                .collect();
            Some(JsonValue::Array(collected))
        }
        _ => None,
    }
}

/// Set `path` to `value`, creating intermediate objects as needed.
pub fn set_path(doc: &mut Document, path: &str, value: JsonValue) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = doc
                .entry(head.to_string())
                .or_insert_with(|| JsonValue::Object(Map::new()));
            if !entry.is_object() {
                *entry = JsonValue::Object(Map::new());
            }
            if let JsonValue::Object(child) = entry {
                set_path(child, rest, value);
            }
        }
    }
}

/// Remove `path`; removal under an array applies to every element.
pub fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => match doc.get_mut(head) {
            Some(JsonValue::Object(child)) => remove_path(child, rest),
            Some(JsonValue::Array(items)) => {
                for item in items {
                    if let JsonValue::Object(child) = item {
                        remove_path(child, rest);
                    }
                }
            }
            _ => {}
        },
    }
}

fn type_rank(value: &JsonValue) -> u8 {
    match value {
        JsonValue::Null => 1,
        JsonValue::Number(_) => 2,
        JsonValue::String(_) => 3,
        JsonValue::Object(_) => 4,
        JsonValue::Array(_) => 5,
        JsonValue::Bool(_) => 8,
    }
}

/// Total order over JSON values: null < numbers < strings < objects < arrays < booleans.
pub fn compare_values(a: &JsonValue, b: &JsonValue) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (JsonValue::String(x), JsonValue::String(y)) => x.cmp(y),
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x.cmp(y),
        (JsonValue::Array(x), JsonValue::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (JsonValue::Object(x), JsonValue::Object(y)) => {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y.iter()) {
                let ord = lk.cmp(rk).then_with(|| compare_values(lv, rv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => Ordering::Equal,
    }
}

/// Equality with numeric normalization (`1` == `1.0`).
pub fn values_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}
