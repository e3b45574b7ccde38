//! Aggregation pipeline vocabulary
//!
//! Stages are plain data. A [`Pipeline`] is built by value: every
//! [`Pipeline::then`] returns a new, longer pipeline, so compiler steps
//! compose without sharing a mutable stage list.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::fmt;
use std::str::FromStr;

use crate::db::document::Document;
use crate::db::search::predicate::Predicate;

/// Value expression evaluated against the current document.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `$path`; missing paths evaluate to nothing
    Field(String),
    /// `$$ROOT`
    Root,
    Literal(JsonValue),
    /// Lowercase of a string; null or missing becomes `""`
    ToLower(Box<Expr>),
    ArrayElemAt(Box<Expr>, i64),
    IfNull(Box<Expr>, Box<Expr>),
    MergeObjects(Vec<Expr>),
    Object(Vec<(String, Expr)>),
}

impl Expr {
    pub fn field(path: impl Into<String>) -> Self {
        Expr::Field(path.into())
    }

    pub fn literal(value: impl Into<JsonValue>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn to_lower(self) -> Self {
        Expr::ToLower(Box::new(self))
    }

    pub fn at(self, index: i64) -> Self {
        Expr::ArrayElemAt(Box::new(self), index)
    }

    pub fn if_null(self, fallback: Expr) -> Self {
        Expr::IfNull(Box::new(self), Box::new(fallback))
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Expr::Field(path) => JsonValue::String(format!("${}", path)),
            Expr::Root => JsonValue::String("$$ROOT".to_string()),
            Expr::Literal(value) => match value {
                JsonValue::String(s) if s.starts_with('$') => json!({ "$literal": s }),
                JsonValue::Object(_) | JsonValue::Array(_) => json!({ "$literal": value }),
                other => other.clone(),
            },
            Expr::ToLower(inner) => json!({ "$toLower": inner.to_json() }),
            Expr::ArrayElemAt(inner, index) => json!({ "$arrayElemAt": [inner.to_json(), index] }),
            Expr::IfNull(value, fallback) => {
                json!({ "$ifNull": [value.to_json(), fallback.to_json()] })
            }
            Expr::MergeObjects(items) => {
                json!({ "$mergeObjects": items.iter().map(Expr::to_json).collect::<Vec<_>>() })
            }
            Expr::Object(fields) => JsonValue::Object(
                fields
                    .iter()
                    .map(|(name, expr)| (name.clone(), expr.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Group accumulator.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Value of the first document in the group, in input order
    First(Expr),
    Sum(Expr),
}

impl Accumulator {
    fn to_json(&self) -> JsonValue {
        match self {
            Accumulator::First(expr) => json!({ "$first": expr.to_json() }),
            Accumulator::Sum(expr) => json!({ "$sum": expr.to_json() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectField {
    Include,
    Exclude,
    Compute(Expr),
}

/// Field projection.
///
/// When any field is included or computed the projection is in inclusion
/// mode and only those fields survive; otherwise it removes the excluded
/// fields and keeps everything else.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    fields: Vec<(String, ProjectField)>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(self, field: impl Into<String>) -> Self {
        self.with(field.into(), ProjectField::Include)
    }

    pub fn exclude(self, field: impl Into<String>) -> Self {
        self.with(field.into(), ProjectField::Exclude)
    }

    pub fn compute(self, field: impl Into<String>, expr: Expr) -> Self {
        self.with(field.into(), ProjectField::Compute(expr))
    }

    fn with(mut self, field: String, spec: ProjectField) -> Self {
        // Later specs for the same field win.
        self.fields.retain(|(name, _)| name != &field);
        self.fields.push((field, spec));
        self
    }

    pub fn fields(&self) -> &[(String, ProjectField)] {
        &self.fields
    }

    pub fn is_inclusion(&self) -> bool {
        self.fields
            .iter()
            .any(|(_, spec)| !matches!(spec, ProjectField::Exclude))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(
            self.fields
                .iter()
                .map(|(name, spec)| {
                    let value = match spec {
                        ProjectField::Include => json!(1),
                        ProjectField::Exclude => json!(0),
                        ProjectField::Compute(expr) => expr.to_json(),
                    };
                    (name.clone(), value)
                })
                .collect(),
        )
    }
}

/// Sort direction; `ASC` unless `DESC` is given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn direction(self) -> i32 {
        match self {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortOrder::Asc),
            "DESC" => Ok(SortOrder::Desc),
            other => Err(format!("sort order must be ASC or DESC, got '{}'", other)),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => f.write_str("ASC"),
            SortOrder::Desc => f.write_str("DESC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Predicate),
    /// Flatten an array field into one document per element
    Unwind(String),
    AddFields(Vec<(String, Expr)>),
    Group {
        key: Expr,
        accumulators: Vec<(String, Accumulator)>,
    },
    ReplaceRoot(Expr),
    /// Stable multi-key sort
    Sort(Vec<SortKey>),
    Skip(u64),
    Limit(u64),
    Project(Projection),
    /// Single `{field: n}` document; no output for empty input
    Count(String),
    /// Named sub-pipelines over the same input, producing exactly one document
    Facet(Vec<(String, Pipeline)>),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Match(_) => "$match",
            Stage::Unwind(_) => "$unwind",
            Stage::AddFields(_) => "$addFields",
            Stage::Group { .. } => "$group",
            Stage::ReplaceRoot(_) => "$replaceRoot",
            Stage::Sort(_) => "$sort",
            Stage::Skip(_) => "$skip",
            Stage::Limit(_) => "$limit",
            Stage::Project(_) => "$project",
            Stage::Count(_) => "$count",
            Stage::Facet(_) => "$facet",
        }
    }

    pub fn to_json(&self) -> JsonValue {
        let body = match self {
            Stage::Match(predicate) => predicate.to_json(),
            Stage::Unwind(path) => JsonValue::String(format!("${}", path)),
            Stage::AddFields(fields) => JsonValue::Object(
                fields
                    .iter()
                    .map(|(name, expr)| (name.clone(), expr.to_json()))
                    .collect(),
            ),
            Stage::Group { key, accumulators } => {
                let mut map = Map::new();
                map.insert("_id".to_string(), key.to_json());
                for (name, acc) in accumulators {
                    map.insert(name.clone(), acc.to_json());
                }
                JsonValue::Object(map)
            }
            Stage::ReplaceRoot(expr) => json!({ "newRoot": expr.to_json() }),
            Stage::Sort(keys) => JsonValue::Object(
                keys.iter()
                    .map(|k| (k.field.clone(), json!(k.order.direction())))
                    .collect(),
            ),
            Stage::Skip(n) | Stage::Limit(n) => json!(n),
            Stage::Project(projection) => projection.to_json(),
            Stage::Count(field) => JsonValue::String(field.clone()),
            Stage::Facet(branches) => JsonValue::Object(
                branches
                    .iter()
                    .map(|(name, pipeline)| (name.clone(), pipeline.to_json()))
                    .collect(),
            ),
        };
        json!({ self.name(): body })
    }
}

/// An ordered list of stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// This pipeline followed by `stage`.
    #[must_use]
    pub fn then(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// This pipeline followed by `stage` when present.
    #[must_use]
    pub fn then_some(self, stage: Option<Stage>) -> Self {
        match stage {
            Some(stage) => self.then(stage),
            None => self,
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Array(self.stages.iter().map(Stage::to_json).collect())
    }
}

impl<'a> IntoIterator for &'a Pipeline {
    type Item = &'a Stage;
    type IntoIter = std::slice::Iter<'a, Stage>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.iter()
    }
}

/// `$set` update applied by the atomic find-and-update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateDocument {
    pub set: Document,
}

impl UpdateDocument {
    pub fn to_json(&self) -> JsonValue {
        json!({ "$set": self.set })
    }
}
