//! Engagement service - queries and guarded updates
//!
//! Sits on top of [`EngagementRepository`] and adds the rules a raw
//! compare-and-swap does not know about:
//! - `customerName` + `projectName` must stay unique
//! - an `ocpSubDomain` may only be claimed by one engagement
//! - a CAS miss is a conflict (or a missing engagement), not a silent no-op
//! - only the launch operation writes `launch`

use chrono::{SecondsFormat, Utc};

use crate::db::engagement::{EngagementRepository, PartitionCounts, ResultPage};
use crate::db::search::compiler::Partition;
use crate::db::search::filter::FilterSpec;
use crate::db::traits::DocumentStore;
use crate::error::Error;
use crate::models::{Engagement, Launch};
use crate::Result;

const PARTICIPANTS_FIELD: &str = "engagementUsers";

#[derive(Debug, Clone)]
pub struct EngagementService<S> {
    repository: EngagementRepository<S>,
}

impl<S: DocumentStore> EngagementService<S> {
    pub fn new(repository: EngagementRepository<S>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &EngagementRepository<S> {
        &self.repository
    }

    pub async fn search(&self, spec: &FilterSpec) -> Result<ResultPage> {
        self.repository.find_page(spec).await
    }

    /// Fetch one engagement, optionally projected by `spec`'s include/exclude.
    pub async fn get(&self, uuid: &str, spec: Option<&FilterSpec>) -> Result<Engagement> {
        self.repository
            .find_by_uuid(uuid, spec)
            .await?
            .ok_or_else(|| Error::EngagementNotFound {
                uuid: uuid.to_string(),
            })
    }

    /// True when no engagement other than `owner_uuid` uses `subdomain`.
    pub async fn is_subdomain_available(
        &self,
        subdomain: &str,
        owner_uuid: Option<&str>,
    ) -> Result<bool> {
        Ok(self
            .repository
            .find_by_subdomain(subdomain, owner_uuid)
            .await?
            .is_none())
    }

    /// Distinct values of `field` containing `fragment`, case-insensitively,
    /// each with its occurrence count.
    pub async fn suggest(&self, field: &str, fragment: &str) -> Result<ResultPage> {
        // `regex::escape` writes `&` as `\&`, which is also the search-string escape.
        let pattern = regex::escape(fragment);
        let spec = FilterSpec::new()
            .search(format!("{} like {}", field, pattern))
            .group_by(field);
        self.repository.find_page(&spec).await
    }

    /// Red Hat versus other participants across the engagements `spec` selects.
    pub async fn participant_counts(&self, spec: &FilterSpec) -> Result<PartitionCounts> {
        let spec = spec.clone().unwind(PARTICIPANTS_FIELD);
        self.repository
            .partition_counts(&spec, None, &Partition::red_hat_participants())
            .await
    }

    /// Write `candidate` if nobody else wrote since `expected_version` was read.
    ///
    /// Server-owned fields in `candidate` (including `launch`) are ignored.
    pub async fn update(&self, candidate: &Engagement, expected_version: &str) -> Result<Engagement> {
        let uuid = required_uuid(candidate)?;
        self.check_unique_names(candidate, uuid).await?;
        self.check_sub_domains(candidate, uuid).await?;
        self.write(candidate, uuid, expected_version, false).await
    }

    /// Mark an engagement launched. Launching twice is rejected.
    pub async fn launch(
        &self,
        uuid: &str,
        expected_version: &str,
        launched_by: &str,
        launched_by_email: &str,
    ) -> Result<Engagement> {
        let current = self.get(uuid, None).await?;
        if current.is_launched() {
            return Err(Error::BusinessRule(format!(
                "engagement {} is already launched",
                uuid
            )));
        }

        let candidate = Engagement {
            uuid: Some(uuid.to_string()),
            launch: Some(Launch {
                launched_date_time: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
                launched_by: Some(launched_by.to_string()),
                launched_by_email: Some(launched_by_email.to_string()),
            }),
            ..Default::default()
        };
        self.write(&candidate, uuid, expected_version, true).await
    }

    async fn write(
        &self,
        candidate: &Engagement,
        uuid: &str,
        expected_version: &str,
        allow_launch_overwrite: bool,
    ) -> Result<Engagement> {
        if let Some(updated) = self
            .repository
            .update_if_version_matches(candidate, expected_version, allow_launch_overwrite)
            .await?
        {
            return Ok(updated);
        }

        match self.repository.find_by_uuid(uuid, None).await? {
            None => Err(Error::EngagementNotFound {
                uuid: uuid.to_string(),
            }),
            Some(_) => {
                tracing::warn!(uuid = %uuid, expected_version = %expected_version, "Rejected stale engagement update");
                Err(Error::VersionConflict {
                    uuid: uuid.to_string(),
                    expected: expected_version.to_string(),
                })
            }
        }
    }

    async fn check_unique_names(&self, candidate: &Engagement, uuid: &str) -> Result<()> {
        if candidate.customer_name.is_none() && candidate.project_name.is_none() {
            return Ok(());
        }

        // A partial candidate keeps the stored half of the pair.
        let stored = match (&candidate.customer_name, &candidate.project_name) {
            (Some(_), Some(_)) => None,
            _ => self.repository.find_by_uuid(uuid, None).await?,
        };
        let customer = candidate
            .customer_name
            .clone()
            .or_else(|| stored.as_ref().and_then(|e| e.customer_name.clone()));
        let project = candidate
            .project_name
            .clone()
            .or_else(|| stored.as_ref().and_then(|e| e.project_name.clone()));
        let (Some(customer), Some(project)) = (customer, project) else {
            return Ok(());
        };
        let (customer, project) = (customer.as_str(), project.as_str());

        let existing = self
            .repository
            .find_by_customer_and_project(customer, project, None)
            .await?;
        match existing {
            Some(other) if other.uuid.as_deref() != Some(uuid) => Err(Error::BusinessRule(format!(
                "an engagement for customer '{}' and project '{}' already exists",
                customer, project
            ))),
            _ => Ok(()),
        }
    }

    async fn check_sub_domains(&self, candidate: &Engagement, uuid: &str) -> Result<()> {
        for subdomain in candidate.sub_domains() {
            if !self.is_subdomain_available(subdomain, Some(uuid)).await? {
                return Err(Error::BusinessRule(format!(
                    "subdomain '{}' is already in use",
                    subdomain
                )));
            }
        }
        Ok(())
    }
}

fn required_uuid(candidate: &Engagement) -> Result<&str> {
    candidate
        .uuid
        .as_deref()
        .ok_or_else(|| Error::InvalidEngagement("engagement uuid is required".to_string()))
}
