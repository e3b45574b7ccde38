//! FilterSpec to pipeline compilation
//!
//! Stage order is fixed:
//!
//! 1. `$match` on the combined predicate
//! 2. `$unwind`, a re-match of the unwound-field conjuncts, and the optional
//!    flattening projection
//! 3. lowercase group key, `$group` keeping the first document, count merge
//! 4. a `$facet` whose `results` branch sorts, pages and projects, and whose
//!    `totalCount` branch counts the same upstream
//! 5. a final `$project` unwrapping `totalCount`

use crate::config::SearchConfig;
use crate::db::document::{trailing_segment, ID_FIELD};
use crate::db::pipeline::{Accumulator, Expr, Pipeline, Projection, Stage};
use crate::db::search::expression::SearchExpressionParser;
use crate::db::search::filter::{FilterSpec, Paging, DEFAULT_PER_PAGE};
use crate::db::search::predicate::{Pattern, Predicate};
use crate::error::Error;
use crate::Result;

pub const RESULTS_FIELD: &str = "results";
pub const TOTAL_COUNT_FIELD: &str = "totalCount";
pub const COUNT_FIELD: &str = "count";
pub const ENGAGEMENT_UUID_FIELD: &str = "engagementUuid";
pub const GROUP_KEY_FIELD: &str = "_groupKey";
const GROUP_DOC_FIELD: &str = "doc";

/// A compiled query and what the caller needs to build the result page.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub pipeline: Pipeline,
    pub paging: Option<Paging>,
    /// Search components the parser dropped
    pub ignored: Vec<String>,
}

/// A predicate splitting the filtered set in two named halves.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub name: String,
    pub complement_name: String,
    pub predicate: Predicate,
}

impl Partition {
    pub fn new(
        name: impl Into<String>,
        complement_name: impl Into<String>,
        predicate: Predicate,
    ) -> Self {
        Self {
            name: name.into(),
            complement_name: complement_name.into(),
            predicate,
        }
    }

    /// Red Hat participants versus everyone else, over unwound `engagementUsers`.
    pub fn red_hat_participants() -> Self {
        let pattern = Pattern::case_insensitive(r"@redhat\.com$")
            .expect("static participant pattern is valid");
        Self::new(
            "redHatUsers",
            "otherUsers",
            Predicate::regex("engagementUsers.email", pattern),
        )
    }
}

#[derive(Debug, Clone)]
pub struct PipelineCompiler {
    parser: SearchExpressionParser,
    default_per_page: u32,
    max_per_page: Option<u32>,
}

impl Default for PipelineCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineCompiler {
    pub fn new() -> Self {
        Self {
            parser: SearchExpressionParser::new(),
            default_per_page: DEFAULT_PER_PAGE,
            max_per_page: None,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            parser: SearchExpressionParser::new(),
            default_per_page: config.default_per_page,
            max_per_page: Some(config.max_per_page),
        }
    }

    pub fn with_parser(mut self, parser: SearchExpressionParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_default_per_page(mut self, per_page: u32) -> Self {
        self.default_per_page = per_page;
        self
    }

    pub fn compile(&self, spec: &FilterSpec, base: Option<Predicate>) -> Result<CompiledQuery> {
        let (upstream, ignored) = self.upstream(spec, base)?;
        let paging = spec.paging(self.default_per_page);

        let sort_keys = spec.sort_keys();
        let results = Pipeline::new()
            .then_some((!sort_keys.is_empty()).then(|| Stage::Sort(sort_keys)))
            .then_some(paging.map(|p| Stage::Skip(p.skip())))
            .then_some(paging.map(|p| Stage::Limit(p.limit())))
            .then(Stage::Project(result_projection(spec)));

        let total = Pipeline::new().then(Stage::Count(COUNT_FIELD.to_string()));

        let pipeline = upstream
            .then(Stage::Facet(vec![
                (RESULTS_FIELD.to_string(), results),
                (TOTAL_COUNT_FIELD.to_string(), total),
            ]))
            .then(Stage::Project(
                Projection::new().include(RESULTS_FIELD).compute(
                    TOTAL_COUNT_FIELD,
                    first_count(TOTAL_COUNT_FIELD).if_null(Expr::literal(0)),
                ),
            ));

        tracing::debug!(pipeline = %pipeline.to_json(), "Compiled query pipeline");

        Ok(CompiledQuery {
            pipeline,
            paging,
            ignored,
        })
    }

    /// Count the filtered set and both halves of `partition` in one pass.
    ///
    /// The output document carries `totalCount`, `partition.name` and
    /// `partition.complement_name`; a branch with nothing to count is absent.
    pub fn compile_partition_counts(
        &self,
        spec: &FilterSpec,
        base: Option<Predicate>,
        partition: &Partition,
    ) -> Result<Pipeline> {
        let (upstream, _) = self.upstream(spec, base)?;

        let count = || Stage::Count(COUNT_FIELD.to_string());
        let branches = vec![
            (TOTAL_COUNT_FIELD.to_string(), Pipeline::new().then(count())),
            (
                partition.name.clone(),
                Pipeline::new()
                    .then(Stage::Match(partition.predicate.clone()))
                    .then(count()),
            ),
            (
                partition.complement_name.clone(),
                Pipeline::new()
                    .then(Stage::Match(partition.predicate.clone().negate()))
                    .then(count()),
            ),
        ];

        let projection = branches
            .iter()
            .fold(Projection::new(), |projection, (name, _)| {
                projection.compute(name.clone(), first_count(name))
            });

        let pipeline = upstream
            .then(Stage::Facet(branches))
            .then(Stage::Project(projection));

        tracing::debug!(pipeline = %pipeline.to_json(), "Compiled partition pipeline");
        Ok(pipeline)
    }

    /// Stages shared by every facet branch: match, unwind, group.
    fn upstream(
        &self,
        spec: &FilterSpec,
        base: Option<Predicate>,
    ) -> Result<(Pipeline, Vec<String>)> {
        spec.validate()?;
        if let (Some(max), Some(per_page)) = (self.max_per_page, spec.per_page) {
            if per_page > max {
                return Err(Error::InvalidFilter(format!(
                    "perPage {} exceeds the maximum of {}",
                    per_page, max
                )));
            }
        }

        let expression = self.parser.parse(spec.search_str())?;
        let predicate = Predicate::all(base.into_iter().chain(expression.predicate));

        let mut pipeline = Pipeline::new().then_some(predicate.clone().map(Stage::Match));

        if let Some(path) = spec.unwind_field_name.as_deref() {
            pipeline = pipeline.then(Stage::Unwind(path.to_string())).then_some(
                predicate
                    .as_ref()
                    .and_then(|p| p.scoped_to(path))
                    .map(Stage::Match),
            );

            let fields = spec.unwind_project_fields();
            if !fields.is_empty() {
                pipeline = pipeline.then(Stage::Project(unwind_projection(path, &fields)));
            }
        }

        if let Some(field) = spec.group_by_field_name.as_deref() {
            pipeline = pipeline
                .then(Stage::AddFields(vec![(
                    GROUP_KEY_FIELD.to_string(),
                    Expr::field(field).to_lower(),
                )]))
                .then(Stage::Group {
                    key: Expr::field(GROUP_KEY_FIELD),
                    accumulators: vec![
                        (GROUP_DOC_FIELD.to_string(), Accumulator::First(Expr::Root)),
                        (COUNT_FIELD.to_string(), Accumulator::Sum(Expr::literal(1))),
                    ],
                })
                .then(Stage::ReplaceRoot(Expr::MergeObjects(vec![
                    Expr::field(GROUP_DOC_FIELD),
                    Expr::Object(vec![(COUNT_FIELD.to_string(), Expr::field(COUNT_FIELD))]),
                ])));
        }

        Ok((pipeline, expression.ignored))
    }
}

/// `$<branch>.count` of the branch's single count document.
fn first_count(branch: &str) -> Expr {
    Expr::field(format!("{}.{}", branch, COUNT_FIELD)).at(0)
}

fn unwind_projection(path: &str, fields: &[String]) -> Projection {
    let projection = fields.iter().fold(Projection::new().exclude(ID_FIELD), |p, name| {
        let full = if name.contains('.') {
            name.clone()
        } else {
            format!("{}.{}", path, name)
        };
        p.compute(trailing_segment(&full).to_string(), Expr::field(full.clone()))
    });
    projection.compute(ENGAGEMENT_UUID_FIELD, Expr::field("uuid"))
}

fn result_projection(spec: &FilterSpec) -> Projection {
    let base = Projection::new().exclude(ID_FIELD);
    let grouped = spec.group_by_field_name.as_deref();

    if let Some(include) = &spec.include {
        return include.iter().fold(base, |p, field| p.include(field.clone()));
    }
    if let Some(exclude) = &spec.exclude {
        let p = exclude.iter().fold(base, |p, field| p.exclude(field.clone()));
        return match grouped {
            Some(_) => p.exclude(GROUP_KEY_FIELD),
            None => p,
        };
    }
    match grouped {
        Some(field) => base
            .compute(trailing_segment(field).to_string(), Expr::field(field))
            .compute(COUNT_FIELD, Expr::field(COUNT_FIELD)),
        None => base,
    }
}
