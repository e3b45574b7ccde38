//! In-process pipeline evaluation

use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

use crate::db::document::{compare_values, get_path, remove_path, set_path, ID_FIELD};
use crate::db::pipeline::{
    Accumulator, Expr, Pipeline, ProjectField, Projection, SortKey, SortOrder, Stage,
};
use crate::error::Error;
use crate::Result;

/// Run `pipeline` over `docs`, in order.
pub(crate) fn run(pipeline: &Pipeline, docs: Vec<JsonValue>) -> Result<Vec<JsonValue>> {
    pipeline
        .stages()
        .iter()
        .try_fold(docs, |docs, stage| exec_stage(stage, docs))
}

fn exec_stage(stage: &Stage, docs: Vec<JsonValue>) -> Result<Vec<JsonValue>> {
    match stage {
        Stage::Match(predicate) => Ok(docs.into_iter().filter(|d| predicate.matches(d)).collect()),
        Stage::Unwind(path) => Ok(exec_unwind(docs, path)),
        Stage::AddFields(fields) => Ok(exec_add_fields(docs, fields)),
        Stage::Group { key, accumulators } => exec_group(docs, key, accumulators),
        Stage::ReplaceRoot(expr) => docs
            .into_iter()
            .map(|doc| match eval(expr, &doc) {
                Some(root @ JsonValue::Object(_)) => Ok(root),
                other => Err(Error::InvalidPipeline(format!(
                    "$replaceRoot expression must evaluate to a document, got {}",
                    other.unwrap_or(JsonValue::Null)
                ))),
            })
            .collect(),
        Stage::Sort(keys) => Ok(exec_sort(docs, keys)),
        Stage::Skip(n) => Ok(docs.into_iter().skip(as_usize(*n)).collect()),
        Stage::Limit(n) => Ok(docs.into_iter().take(as_usize(*n)).collect()),
        Stage::Project(projection) => Ok(docs.iter().map(|d| exec_project(d, projection)).collect()),
        Stage::Count(field) => Ok(exec_count(docs, field)),
        Stage::Facet(branches) => {
            let mut out = Map::new();
            for (name, branch) in branches {
                let results = run(branch, docs.clone())?;
                out.insert(name.clone(), JsonValue::Array(results));
            }
            Ok(vec![JsonValue::Object(out)])
        }
    }
}

fn as_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

/// Evaluate an expression; `None` means the value is missing.
pub(crate) fn eval(expr: &Expr, doc: &JsonValue) -> Option<JsonValue> {
    match expr {
        Expr::Field(path) => get_path(doc, path),
        Expr::Root => Some(doc.clone()),
        Expr::Literal(value) => Some(value.clone()),
        Expr::ToLower(inner) => Some(JsonValue::String(match eval(inner, doc) {
            None | Some(JsonValue::Null) => String::new(),
            Some(JsonValue::String(s)) => s.to_lowercase(),
            Some(other) => other.to_string().to_lowercase(),
        })),
        Expr::ArrayElemAt(inner, index) => match eval(inner, doc)? {
            JsonValue::Array(items) => {
                let idx = if *index < 0 {
                    items.len().checked_sub(index.unsigned_abs() as usize)?
                } else {
                    *index as usize
                };
                items.into_iter().nth(idx)
            }
            _ => None,
        },
        Expr::IfNull(value, fallback) => match eval(value, doc) {
            None | Some(JsonValue::Null) => eval(fallback, doc),
            present => present,
        },
        Expr::MergeObjects(items) => {
            let mut merged = Map::new();
            for item in items {
                if let Some(JsonValue::Object(map)) = eval(item, doc) {
                    merged.extend(map);
                }
            }
            Some(JsonValue::Object(merged))
        }
        Expr::Object(fields) => Some(JsonValue::Object(
            fields
                .iter()
                .filter_map(|(name, e)| eval(e, doc).map(|v| (name.clone(), v)))
                .collect(),
        )),
    }
}

fn exec_unwind(docs: Vec<JsonValue>, path: &str) -> Vec<JsonValue> {
    let mut out = Vec::new();
    for doc in docs {
        match get_path(&doc, path) {
            Some(JsonValue::Array(items)) => {
                for item in items {
                    let mut copy = doc.clone();
                    if let JsonValue::Object(map) = &mut copy {
                        set_path(map, path, item);
                    }
                    out.push(copy);
                }
            }
            // Missing, null and empty arrays produce no output.
            None | Some(JsonValue::Null) => {}
            Some(_) => out.push(doc),
        }
    }
    out
}

fn exec_add_fields(docs: Vec<JsonValue>, fields: &[(String, Expr)]) -> Vec<JsonValue> {
    docs.into_iter()
        .map(|mut doc| {
            for (name, expr) in fields {
                if let Some(value) = eval(expr, &doc) {
                    if let JsonValue::Object(map) = &mut doc {
                        set_path(map, name, value);
                    }
                }
            }
            doc
        })
        .collect()
}

enum AccumulatorState {
    First(Option<JsonValue>),
    Sum { int: i64, float: Option<f64> },
}

impl AccumulatorState {
    fn new(acc: &Accumulator) -> Self {
        match acc {
            Accumulator::First(_) => AccumulatorState::First(None),
            Accumulator::Sum(_) => AccumulatorState::Sum {
                int: 0,
                float: None,
            },
        }
    }

    fn add(&mut self, acc: &Accumulator, doc: &JsonValue) {
        match (acc, self) {
            (Accumulator::First(expr), AccumulatorState::First(slot)) => {
                if slot.is_none() {
                    *slot = Some(eval(expr, doc).unwrap_or(JsonValue::Null));
                }
            }
            (Accumulator::Sum(expr), AccumulatorState::Sum { int, float }) => {
                let Some(JsonValue::Number(n)) = eval(expr, doc) else {
                    return;
                };
                // Integer sums stay integral until a float or an overflow shows up.
                if let Some(f) = float {
                    *f += n.as_f64().unwrap_or(0.0);
                } else if let Some(sum) = n.as_i64().and_then(|i| int.checked_add(i)) {
                    *int = sum;
                } else {
                    *float = Some(*int as f64 + n.as_f64().unwrap_or(0.0));
                }
            }
            _ => {}
        }
    }

    fn finish(self) -> JsonValue {
        match self {
            AccumulatorState::First(value) => value.unwrap_or(JsonValue::Null),
            AccumulatorState::Sum { int, float: None } => JsonValue::from(int),
            AccumulatorState::Sum {
                float: Some(f), ..
            } => JsonValue::from(f),
        }
    }
}

fn exec_group(
    docs: Vec<JsonValue>,
    key: &Expr,
    accumulators: &[(String, Accumulator)],
) -> Result<Vec<JsonValue>> {
    let mut groups: HashMap<String, (JsonValue, Vec<AccumulatorState>)> = HashMap::new();
    let mut insertion_order: Vec<String> = Vec::new();

    for doc in &docs {
        let key_val = eval(key, doc).unwrap_or(JsonValue::Null);
        let key_str = serde_json::to_string(&key_val)?;

        let (_, states) = groups.entry(key_str.clone()).or_insert_with(|| {
            insertion_order.push(key_str);
            let initial = accumulators
                .iter()
                .map(|(_, acc)| AccumulatorState::new(acc))
                .collect();
            (key_val, initial)
        });

        for ((_, acc), state) in accumulators.iter().zip(states.iter_mut()) {
            state.add(acc, doc);
        }
    }

    let mut out = Vec::with_capacity(insertion_order.len());
    for key_str in insertion_order {
        if let Some((key_val, states)) = groups.remove(&key_str) {
            let mut map = Map::new();
            map.insert(ID_FIELD.to_string(), key_val);
            for ((name, _), state) in accumulators.iter().zip(states) {
                map.insert(name.clone(), state.finish());
            }
            out.push(JsonValue::Object(map));
        }
    }
    Ok(out)
}

fn exec_sort(mut docs: Vec<JsonValue>, keys: &[SortKey]) -> Vec<JsonValue> {
    // `sort_by` is stable: ties keep their input order.
    docs.sort_by(|a, b| {
        for key in keys {
            let va = get_path(a, &key.field).unwrap_or(JsonValue::Null);
            let vb = get_path(b, &key.field).unwrap_or(JsonValue::Null);
            let ord = compare_values(&va, &vb);
            let ord = match key.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });
    docs
}

pub(crate) fn exec_project(doc: &JsonValue, projection: &Projection) -> JsonValue {
    if !projection.is_inclusion() {
        let mut copy = doc.clone();
        if let JsonValue::Object(map) = &mut copy {
            for (field, spec) in projection.fields() {
                if matches!(spec, ProjectField::Exclude) {
                    remove_path(map, field);
                }
            }
        }
        return copy;
    }

    let mut out = JsonValue::Object(Map::new());
    let id_excluded = projection
        .fields()
        .iter()
        .any(|(field, spec)| field == ID_FIELD && matches!(spec, ProjectField::Exclude));
    if !id_excluded {
        if let Some(id) = doc.get(ID_FIELD) {
            merge_values(&mut out, single(ID_FIELD, id.clone()));
        }
    }

    for (field, spec) in projection.fields() {
        match spec {
            ProjectField::Include => {
                let segments: Vec<&str> = field.split('.').collect();
                if let Some(picked) = pick(doc, &segments) {
                    merge_values(&mut out, picked);
                }
            }
            ProjectField::Compute(expr) => {
                if let Some(value) = eval(expr, doc) {
                    if let JsonValue::Object(map) = &mut out {
                        set_path(map, field, value);
                    }
                }
            }
            ProjectField::Exclude => {}
        }
    }
    out
}

fn single(name: &str, value: JsonValue) -> JsonValue {
    let mut map = Map::new();
    map.insert(name.to_string(), value);
    JsonValue::Object(map)
}

/// The sub-document of `value` holding only the path `segments`.
fn pick(value: &JsonValue, segments: &[&str]) -> Option<JsonValue> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(value.clone());
    };
    match value {
        JsonValue::Object(map) => {
            let child = map.get(*first)?;
            pick(child, rest).map(|v| single(first, v))
        }
        JsonValue::Array(items) => Some(JsonValue::Array(
            items
                .iter()
                .filter(|item| item.is_object())
                .filter_map(|item| pick(item, segments))
                .collect(),
        )),
        _ => None,
    }
}

fn merge_values(target: &mut JsonValue, source: JsonValue) {
    match (target, source) {
        (JsonValue::Object(t), JsonValue::Object(s)) => {
            for (k, v) in s {
                match t.get_mut(&k) {
                    Some(existing) => merge_values(existing, v),
                    None => {
                        t.insert(k, v);
                    }
                }
            }
        }
        (JsonValue::Array(t), JsonValue::Array(s)) if t.len() == s.len() => {
            for (existing, v) in t.iter_mut().zip(s) {
                merge_values(existing, v);
            }
        }
        (t, s) => *t = s,
    }
}

fn exec_count(docs: Vec<JsonValue>, field: &str) -> Vec<JsonValue> {
    if docs.is_empty() {
        return Vec::new();
    }
    vec![single(field, JsonValue::from(docs.len() as u64))]
}
