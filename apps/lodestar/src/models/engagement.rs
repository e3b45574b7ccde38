//! The Engagement document

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::db::document::Document;
use crate::Result;

/// An engagement as stored in the `engagements` collection.
///
/// Every field is optional on the wire: lookups may be projected, and update
/// candidates only carry what the caller wants to write. Collections use
/// `Option<Vec<_>>` so that "not supplied" and "set to empty" stay distinct.
/// Fields not modelled here are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engagement {
    /// Store-internal id
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub mongo_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_reference: Option<bool>,
    /// Version token for optimistic concurrency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_details: Option<CreationDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch: Option<Launch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commits: Option<Vec<Commit>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<Category>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<Artifact>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosting_environments: Option<Vec<HostingEnvironment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_users: Option<Vec<EngagementUser>>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Launch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launched_date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launched_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launched_by_email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_status: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<StatusMessage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committed_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostingEnvironment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocp_cloud_provider_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocp_cluster_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocp_persistent_storage_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocp_sub_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocp_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Engagement {
    pub fn from_document(document: Document) -> Result<Self> {
        Ok(serde_json::from_value(JsonValue::Object(document))?)
    }

    pub fn to_document(&self) -> Result<Document> {
        match serde_json::to_value(self)? {
            JsonValue::Object(map) => Ok(map),
            // A struct with named fields always serializes to an object.
            other => Err(crate::Error::InvalidEngagement(format!(
                "engagement serialized to non-object JSON: {}",
                other
            ))),
        }
    }

    pub fn is_launched(&self) -> bool {
        self.launch.is_some()
    }

    /// Sub-domains claimed by this engagement's hosting environments.
    pub fn sub_domains(&self) -> impl Iterator<Item = &str> {
        self.hosting_environments
            .iter()
            .flatten()
            .filter_map(|env| env.ocp_sub_domain.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}
