//! Engagement collection accessor
//!
//! Runs compiled queries, point lookups and the compare-and-swap write
//! against a [`DocumentStore`], bounding every store call by the configured
//! operation timeout.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::future::Future;
use std::time::Duration;

use crate::config::Config;
use crate::db::concurrency::{ConcurrencyGuard, UUID_FIELD};
use crate::db::document::{Document, ID_FIELD};
use crate::db::pipeline::Projection;
use crate::db::search::compiler::{
    Partition, PipelineCompiler, RESULTS_FIELD, TOTAL_COUNT_FIELD,
};
use crate::db::search::filter::FilterSpec;
use crate::db::search::predicate::{Pattern, Predicate};
use crate::db::traits::DocumentStore;
use crate::error::Error;
use crate::models::Engagement;
use crate::Result;

pub const SUB_DOMAIN_FIELD: &str = "hostingEnvironments.ocpSubDomain";

const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPage {
    /// Projected documents; grouped and unwound queries change their shape
    pub results: Vec<Document>,
    pub total_count: u64,
    pub current_page: u32,
    pub per_page: u64,
}

impl ResultPage {
    /// Results read back as engagements.
    pub fn engagements(&self) -> Result<Vec<Engagement>> {
        self.results
            .iter()
            .cloned()
            .map(Engagement::from_document)
            .collect()
    }
}

/// Counts for a [`Partition`]; a side with nothing to count is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionCounts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matching: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complement: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct EngagementRepository<S> {
    store: S,
    compiler: PipelineCompiler,
    guard: ConcurrencyGuard,
    timeout: Duration,
}

impl<S: DocumentStore> EngagementRepository<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            compiler: PipelineCompiler::new(),
            guard: ConcurrencyGuard::new(),
            timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    pub fn from_config(store: S, config: &Config) -> Self {
        Self {
            store,
            compiler: PipelineCompiler::from_config(&config.search),
            guard: ConcurrencyGuard::new(),
            timeout: config.store.operation_timeout(),
        }
    }

    pub fn with_compiler(mut self, compiler: PipelineCompiler) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn timed<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, timeout = ?self.timeout, "Store call timed out");
                Err(Error::StoreTimeout {
                    operation,
                    timeout: self.timeout,
                })
            }
        }
    }

    pub async fn find_page(&self, spec: &FilterSpec) -> Result<ResultPage> {
        self.find_page_matching(spec, None).await
    }

    /// Query with `base` AND-ed in front of the `spec.search` predicate.
    #[tracing::instrument(skip(self, spec, base), fields(search = ?spec.search, page = ?spec.page))]
    pub async fn find_page_matching(
        &self,
        spec: &FilterSpec,
        base: Option<Predicate>,
    ) -> Result<ResultPage> {
        let compiled = self.compiler.compile(spec, base)?;
        let output = self
            .timed("aggregate", self.store.aggregate(&compiled.pipeline))
            .await?;

        let mut envelope = output.into_iter().next().unwrap_or_default();
        let results: Vec<Document> = match envelope.remove(RESULTS_FIELD) {
            Some(JsonValue::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    JsonValue::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        let total_count = count_field(&envelope, TOTAL_COUNT_FIELD).unwrap_or(0);

        let page = match compiled.paging {
            Some(paging) => ResultPage {
                results,
                total_count,
                current_page: paging.page,
                per_page: u64::from(paging.per_page),
            },
            None => ResultPage {
                results,
                total_count,
                current_page: 1,
                per_page: total_count,
            },
        };

        tracing::debug!(
            returned = page.results.len(),
            total_count = page.total_count,
            ignored = ?compiled.ignored,
            "Query completed"
        );
        Ok(page)
    }

    #[tracing::instrument(skip(self, projection))]
    pub async fn find_by_uuid(
        &self,
        uuid: &str,
        projection: Option<&FilterSpec>,
    ) -> Result<Option<Engagement>> {
        self.find_one(Predicate::eq(UUID_FIELD, uuid), projection)
            .await
    }

    /// Exact match on the `customerName` + `projectName` pair.
    #[tracing::instrument(skip(self, projection))]
    pub async fn find_by_customer_and_project(
        &self,
        customer_name: &str,
        project_name: &str,
        projection: Option<&FilterSpec>,
    ) -> Result<Option<Engagement>> {
        let filter = Predicate::eq("customerName", customer_name)
            .and(Predicate::eq("projectName", project_name));
        self.find_one(filter, projection).await
    }

    /// Engagement owning `subdomain` (case-insensitive), ignoring `exclude_uuid`.
    #[tracing::instrument(skip(self))]
    pub async fn find_by_subdomain(
        &self,
        subdomain: &str,
        exclude_uuid: Option<&str>,
    ) -> Result<Option<Engagement>> {
        let mut filter = Predicate::regex(
            SUB_DOMAIN_FIELD,
            Pattern::exact_case_insensitive(subdomain),
        );
        if let Some(uuid) = exclude_uuid {
            filter = filter.and(Predicate::eq(UUID_FIELD, uuid).negate());
        }
        self.find_one(filter, None).await
    }

    async fn find_one(
        &self,
        filter: Predicate,
        projection: Option<&FilterSpec>,
    ) -> Result<Option<Engagement>> {
        let projection = match projection {
            Some(spec) => lookup_projection(spec)?,
            None => Projection::new().exclude(ID_FIELD),
        };
        let found = self
            .timed("find_one", self.store.find_one(&filter, Some(&projection)))
            .await?;
        found.map(Engagement::from_document).transpose()
    }

    /// Compare-and-swap write of `candidate`.
    ///
    /// # Returns
    /// * `Ok(Some(engagement))` - Post-update engagement
    /// * `Ok(None)` - uuid unknown or `expected_version` stale
    #[tracing::instrument(skip(self, candidate), fields(uuid = ?candidate.uuid))]
    pub async fn update_if_version_matches(
        &self,
        candidate: &Engagement,
        expected_version: &str,
        allow_launch_overwrite: bool,
    ) -> Result<Option<Engagement>> {
        let document = candidate.to_document()?;
        let updated = self
            .timed(
                "find_one_and_update",
                self.guard.update_if_version_matches(
                    &self.store,
                    &document,
                    expected_version,
                    allow_launch_overwrite,
                ),
            )
            .await?;
        updated.map(Engagement::from_document).transpose()
    }

    #[tracing::instrument(skip(self, spec, base, partition), fields(partition = %partition.name))]
    pub async fn partition_counts(
        &self,
        spec: &FilterSpec,
        base: Option<Predicate>,
        partition: &Partition,
    ) -> Result<PartitionCounts> {
        let pipeline = self
            .compiler
            .compile_partition_counts(spec, base, partition)?;
        let output = self.timed("aggregate", self.store.aggregate(&pipeline)).await?;
        let envelope = output.into_iter().next().unwrap_or_default();

        Ok(PartitionCounts {
            total_count: count_field(&envelope, TOTAL_COUNT_FIELD),
            matching: count_field(&envelope, &partition.name),
            complement: count_field(&envelope, &partition.complement_name),
        })
    }
}

fn count_field(envelope: &Document, field: &str) -> Option<u64> {
    envelope.get(field).and_then(JsonValue::as_u64)
}

/// Direct lookups honour only the projection part of a spec.
fn lookup_projection(spec: &FilterSpec) -> Result<Projection> {
    spec.validate()?;
    let base = Projection::new().exclude(ID_FIELD);
    Ok(match (&spec.include, &spec.exclude) {
        (Some(include), _) => include.iter().fold(base, |p, f| p.include(f.clone())),
        (None, Some(exclude)) => exclude.iter().fold(base, |p, f| p.exclude(f.clone())),
        (None, None) => base,
    })
}
