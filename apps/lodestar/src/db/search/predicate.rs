//! Typed match predicates
//!
//! A [`Predicate`] is both the compiled form of a search expression and the
//! filter of direct lookups. It renders to the store's `$match` dialect via
//! [`Predicate::to_json`] and can be evaluated in-process with
//! [`Predicate::matches`].

use regex::{Regex, RegexBuilder};
use serde_json::{json, Value as JsonValue};
use std::cmp::Ordering;
use std::fmt;

use crate::db::document::{compare_values, is_under, match_candidates, values_equal};

/// A regular expression plus its source text.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    case_insensitive: bool,
    regex: Regex,
}

impl Pattern {
    /// Unanchored, case-insensitive pattern (`field like value`).
    pub fn case_insensitive(source: &str) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(source).case_insensitive(true).build()?;
        Ok(Self {
            source: source.to_string(),
            case_insensitive: true,
            regex,
        })
    }

    /// Case-insensitive pattern matching exactly `text`, with regex metacharacters escaped.
    pub fn exact_case_insensitive(text: &str) -> Self {
        let source = format!("^{}$", regex::escape(text));
        let regex = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .expect("escaped literal is a valid pattern");
        Self {
            source,
            case_insensitive: true,
            regex,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    fn options(&self) -> &'static str {
        if self.case_insensitive {
            "i"
        } else {
            ""
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.options())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.case_insensitive == other.case_insensitive
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    fn operator(self) -> &'static str {
        match self {
            Comparison::Gt => "$gt",
            Comparison::Gte => "$gte",
            Comparison::Lt => "$lt",
            Comparison::Lte => "$lte",
        }
    }

    fn holds(self, ord: Ordering) -> bool {
        match self {
            Comparison::Gt => ord == Ordering::Greater,
            Comparison::Gte => ord != Ordering::Less,
            Comparison::Lt => ord == Ordering::Less,
            Comparison::Lte => ord != Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Field equals value (any element, for arrays)
    Eq { field: String, value: JsonValue },
    /// Ordered comparison between values of the same JSON type
    Compare {
        field: String,
        op: Comparison,
        value: JsonValue,
    },
    /// Some string value at the field matches the pattern
    Regex { field: String, pattern: Pattern },
    /// No string value at the field matches the pattern
    NotRegex { field: String, pattern: Pattern },
    /// Field present with a non-null value (`exists: true`) or not (`exists: false`)
    Exists { field: String, exists: bool },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Predicate::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn compare(field: impl Into<String>, op: Comparison, value: impl Into<JsonValue>) -> Self {
        Predicate::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn regex(field: impl Into<String>, pattern: Pattern) -> Self {
        Predicate::Regex {
            field: field.into(),
            pattern,
        }
    }

    pub fn not_regex(field: impl Into<String>, pattern: Pattern) -> Self {
        Predicate::NotRegex {
            field: field.into(),
            pattern,
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Predicate::Exists {
            field: field.into(),
            exists: true,
        }
    }

    pub fn not_exists(field: impl Into<String>) -> Self {
        Predicate::Exists {
            field: field.into(),
            exists: false,
        }
    }

    /// Conjunction; nested conjunctions are flattened and a single operand is returned as-is.
    pub fn all(predicates: impl IntoIterator<Item = Predicate>) -> Option<Self> {
        let mut flat = Vec::new();
        for p in predicates {
            match p {
                Predicate::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Predicate::And(flat)),
        }
    }

    /// Disjunction; a single operand is returned as-is.
    pub fn any(predicates: impl IntoIterator<Item = Predicate>) -> Option<Self> {
        let mut items: Vec<Predicate> = predicates.into_iter().collect();
        match items.len() {
            0 => None,
            1 => items.pop(),
            _ => Some(Predicate::Or(items)),
        }
    }

    pub fn negate(self) -> Self {
        match self {
            Predicate::Not(inner) => *inner,
            Predicate::Exists { field, exists } => Predicate::Exists {
                field,
                exists: !exists,
            },
            Predicate::Regex { field, pattern } => Predicate::NotRegex { field, pattern },
            Predicate::NotRegex { field, pattern } => Predicate::Regex { field, pattern },
            other => Predicate::Not(Box::new(other)),
        }
    }

    /// `self AND other`
    pub fn and(self, other: Predicate) -> Self {
        let mut items = match self {
            Predicate::And(items) => items,
            p => vec![p],
        };
        match other {
            Predicate::And(more) => items.extend(more),
            p => items.push(p),
        }
        Predicate::And(items)
    }

    /// Top-level conjuncts (a non-conjunction is its own single conjunct).
    pub fn conjuncts(&self) -> Vec<&Predicate> {
        match self {
            Predicate::And(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    /// Field paths referenced anywhere in the predicate.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Predicate::Eq { field, .. }
            | Predicate::Compare { field, .. }
            | Predicate::Regex { field, .. }
            | Predicate::NotRegex { field, .. }
            | Predicate::Exists { field, .. } => vec![field.as_str()],
            Predicate::And(items) | Predicate::Or(items) => {
                items.iter().flat_map(|p| p.fields()).collect()
            }
            Predicate::Not(inner) => inner.fields(),
        }
    }

    /// The conjuncts that only reference fields under `path`, if any.
    pub fn scoped_to(&self, path: &str) -> Option<Predicate> {
        Predicate::all(
            self.conjuncts()
                .into_iter()
                .filter(|p| {
                    let fields = p.fields();
                    !fields.is_empty() && fields.iter().all(|f| is_under(f, path))
                })
                .cloned(),
        )
    }

    pub fn matches(&self, doc: &JsonValue) -> bool {
        match self {
            Predicate::Eq { field, value } => match_candidates(doc, field)
                .into_iter()
                .any(|v| values_equal(v, value)),
            Predicate::Compare { field, op, value } => {
                match_candidates(doc, field).into_iter().any(|v| {
                    same_kind(v, value) && op.holds(compare_values(v, value))
                })
            }
            Predicate::Regex { field, pattern } => regex_matches(doc, field, pattern),
            Predicate::NotRegex { field, pattern } => !regex_matches(doc, field, pattern),
            Predicate::Exists { field, exists } => {
                let present = match_candidates(doc, field)
                    .into_iter()
                    .any(|v| !v.is_null());
                present == *exists
            }
            Predicate::And(items) => items.iter().all(|p| p.matches(doc)),
            Predicate::Or(items) => items.iter().any(|p| p.matches(doc)),
            Predicate::Not(inner) => !inner.matches(doc),
        }
    }

    /// Render in the `$match` dialect of document stores.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Predicate::Eq { field, value } => json!({ field: value }),
            Predicate::Compare { field, op, value } => json!({ field: { op.operator(): value } }),
            Predicate::Regex { field, pattern } => json!({
                field: { "$regex": pattern.as_str(), "$options": pattern.options() }
            }),
            Predicate::NotRegex { field, pattern } => json!({
                field: { "$not": { "$regex": pattern.as_str(), "$options": pattern.options() } }
            }),
            Predicate::Exists { field, exists } => {
                if *exists {
                    json!({ field: { "$exists": true, "$ne": null } })
                } else {
                    json!({ "$or": [
                        { field: { "$exists": false } },
                        { field: null }
                    ] })
                }
            }
            Predicate::And(items) => {
                json!({ "$and": items.iter().map(Predicate::to_json).collect::<Vec<_>>() })
            }
            Predicate::Or(items) => {
                json!({ "$or": items.iter().map(Predicate::to_json).collect::<Vec<_>>() })
            }
            Predicate::Not(inner) => json!({ "$nor": [inner.to_json()] }),
        }
    }
}

fn regex_matches(doc: &JsonValue, field: &str, pattern: &Pattern) -> bool {
    match_candidates(doc, field)
        .into_iter()
        .any(|v| v.as_str().is_some_and(|s| pattern.is_match(s)))
}

fn same_kind(a: &JsonValue, b: &JsonValue) -> bool {
    matches!(
        (a, b),
        (JsonValue::Number(_), JsonValue::Number(_))
            | (JsonValue::String(_), JsonValue::String(_))
            | (JsonValue::Bool(_), JsonValue::Bool(_))
    )
}
