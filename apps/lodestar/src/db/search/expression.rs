//! Search expression parsing
//!
//! A search string is a `&`-delimited list of components:
//!
//! ```text
//! search    := component ('&' component)*
//! component := field '=' value
//!            | field 'like' value
//!            | field 'not' 'like' value
//!            | field 'exists'
//!            | 'not' field 'exists'
//!            | field 'not' 'exists'
//! ```
//!
//! `state=`, `start=`, `end=` and `today=` are reserved keys: `state` selects
//! a temporal state (a comma list is OR-ed), `start`/`end` bound `endDate`,
//! and `today` overrides the reference date of the state predicates.
//! Components that match no form are dropped and reported in
//! [`SearchExpression::ignored`].

use chrono::{NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

use crate::db::search::escape::{split_unescaped, unescape_component};
use crate::db::search::fields::{self, parse_date, DATE_FORMAT};
use crate::db::search::predicate::{Comparison, Pattern, Predicate};
use crate::db::search::state::EngagementState;
use crate::error::Error;
use crate::Result;

const STATE_KEY: &str = "state";
const START_KEY: &str = "start";
const END_KEY: &str = "end";
const TODAY_KEY: &str = "today";

/// Field bounded by `start=`/`end=`.
const RANGE_FIELD: &str = "endDate";

fn component_regex(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("Failed to compile search component pattern")
}

lazy_static! {
    static ref NOT_LIKE: Regex = component_regex(r"^\s*([A-Za-z_][\w.]*)\s+not\s+like\s+(.*?)\s*$");
    static ref LIKE: Regex = component_regex(r"^\s*([A-Za-z_][\w.]*)\s+like\s+(.*?)\s*$");
    static ref NOT_FIELD_EXISTS: Regex = component_regex(r"^\s*not\s+([A-Za-z_][\w.]*)\s+exists\s*$");
    static ref FIELD_NOT_EXISTS: Regex = component_regex(r"^\s*([A-Za-z_][\w.]*)\s+not\s+exists\s*$");
    static ref EXISTS: Regex = component_regex(r"^\s*([A-Za-z_][\w.]*)\s+exists\s*$");
    static ref EQUALS: Regex = component_regex(r"^\s*([A-Za-z_][\w.]*)\s*=(.*)$");
}

/// Parse result: the conjunction of every parsed component, plus the
/// components that were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchExpression {
    pub predicate: Option<Predicate>,
    pub ignored: Vec<String>,
}

#[derive(Debug, Default)]
struct TemporalParts {
    states: Vec<EngagementState>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchExpressionParser {
    today: Option<NaiveDate>,
}

impl SearchExpressionParser {
    /// Parser whose temporal states default to the current UTC date.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser with a fixed reference date.
    pub fn with_today(today: NaiveDate) -> Self {
        Self { today: Some(today) }
    }

    pub fn parse(&self, search: &str) -> Result<SearchExpression> {
        let mut predicates = Vec::new();
        let mut ignored = Vec::new();
        let mut temporal = TemporalParts::default();

        for raw in split_unescaped(search, '&') {
            if raw.trim().is_empty() {
                continue;
            }
            match parse_component(raw, &mut temporal)? {
                Some(predicate) => predicates.push(predicate),
                None if is_temporal(raw) => {}
                None => {
                    tracing::warn!(component = %raw, "Ignoring unrecognized search component");
                    ignored.push(raw.to_string());
                }
            }
        }

        predicates.extend(self.temporal_predicates(&temporal));

        Ok(SearchExpression {
            predicate: Predicate::all(predicates),
            ignored,
        })
    }

    fn temporal_predicates(&self, parts: &TemporalParts) -> Vec<Predicate> {
        let mut out = Vec::new();

        if !parts.states.is_empty() {
            // Without `today=`, an explicit window is evaluated as of its
            // start: `state=active&start=..&end=..` means "active during the
            // window", not "active now and ending inside it".
            if parts.today.is_none() {
                if let Some(start) = parts.start {
                    tracing::debug!(%start, "Using window start as reference date for state");
                }
            }
            let today = parts
                .today
                .or(parts.start)
                .or(self.today)
                .unwrap_or_else(|| Utc::now().date_naive())
                .format(DATE_FORMAT)
                .to_string();
            let states = parts.states.iter().map(|s| s.predicate(&today));
            out.extend(Predicate::any(states));
        }

        if let Some(start) = parts.start {
            out.push(Predicate::compare(
                RANGE_FIELD,
                Comparison::Gte,
                start.format(DATE_FORMAT).to_string(),
            ));
        }
        if let Some(end) = parts.end {
            out.push(Predicate::compare(
                RANGE_FIELD,
                Comparison::Lte,
                end.format(DATE_FORMAT).to_string(),
            ));
        }
        out
    }
}

fn is_temporal(raw: &str) -> bool {
    EQUALS
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|key| is_reserved(key.as_str()))
        .unwrap_or(false)
}

fn is_reserved(key: &str) -> bool {
    [STATE_KEY, START_KEY, END_KEY, TODAY_KEY]
        .iter()
        .any(|k| k.eq_ignore_ascii_case(key))
}

/// Classify one component. Reserved keys are collected into `temporal` and
/// yield no predicate of their own.
fn parse_component(raw: &str, temporal: &mut TemporalParts) -> Result<Option<Predicate>> {
    if let Some(c) = NOT_LIKE.captures(raw) {
        let field = &c[1];
        return Ok(Some(Predicate::not_regex(field, like_pattern(field, &c[2])?)));
    }
    if let Some(c) = LIKE.captures(raw) {
        let field = &c[1];
        return Ok(Some(Predicate::regex(field, like_pattern(field, &c[2])?)));
    }
    if let Some(c) = NOT_FIELD_EXISTS
        .captures(raw)
        .or_else(|| FIELD_NOT_EXISTS.captures(raw))
    {
        return Ok(Some(Predicate::not_exists(&c[1])));
    }
    if let Some(c) = EXISTS.captures(raw) {
        return Ok(Some(Predicate::exists(&c[1])));
    }
    if let Some(c) = EQUALS.captures(raw) {
        let key = &c[1];
        let value = unescape_component(c[2].trim());

        if key.eq_ignore_ascii_case(STATE_KEY) {
            // `state=` alone still selects the default state.
            let names: Vec<&str> = value.split(',').filter(|n| !n.trim().is_empty()).collect();
            if names.is_empty() {
                temporal.states.push(EngagementState::from_name(&value));
            }
            temporal
                .states
                .extend(names.into_iter().map(EngagementState::from_name));
            return Ok(None);
        }
        if key.eq_ignore_ascii_case(START_KEY) {
            temporal.start = Some(reserved_date(START_KEY, &value)?);
            return Ok(None);
        }
        if key.eq_ignore_ascii_case(END_KEY) {
            temporal.end = Some(reserved_date(END_KEY, &value)?);
            return Ok(None);
        }
        if key.eq_ignore_ascii_case(TODAY_KEY) {
            temporal.today = Some(reserved_date(TODAY_KEY, &value)?);
            return Ok(None);
        }

        let coerced = fields::coerce(key, &value)?;
        return Ok(Some(Predicate::eq(key, coerced)));
    }
    Ok(None)
}

fn like_pattern(field: &str, raw: &str) -> Result<Pattern> {
    let source = unescape_component(raw);
    Pattern::case_insensitive(&source)
        .map_err(|e| Error::search_field(field, format!("invalid pattern '{}': {}", source, e)))
}

fn reserved_date(key: &str, value: &str) -> Result<NaiveDate> {
    parse_date(value).map_err(|reason| Error::search_field(key, reason))
}
