//! Searchable Engagement fields and their value parsers
//!
//! `field=value` components are coerced through this registry; a field that
//! is not listed here cannot be used for equality.

use chrono::NaiveDate;
use serde_json::Value as JsonValue;

use crate::error::Error;
use crate::Result;

/// Date format of every date-valued Engagement field.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Boolean,
    /// Zero-padded `YYYY-MM-DD`, stored as a string
    Date,
}

impl FieldType {
    pub fn parse(self, raw: &str) -> std::result::Result<JsonValue, String> {
        match self {
            FieldType::String => Ok(JsonValue::String(raw.to_string())),
            FieldType::Integer => raw
                .trim()
                .parse::<i64>()
                .map(JsonValue::from)
                .map_err(|e| format!("'{}' is not an integer: {}", raw, e)),
            FieldType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(JsonValue::Bool(true)),
                "false" => Ok(JsonValue::Bool(false)),
                _ => Err(format!("'{}' is not a boolean", raw)),
            },
            FieldType::Date => parse_date(raw)
                .map(|d| JsonValue::String(d.format(DATE_FORMAT).to_string())),
        }
    }
}

pub fn parse_date(raw: &str) -> std::result::Result<NaiveDate, String> {
    let raw = raw.trim();
    // `%Y-%m-%d` also accepts unpadded parts; lexicographic ordering needs padding.
    if raw.len() != 10 {
        return Err(format!("'{}' is not a YYYY-MM-DD date", raw));
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| format!("'{}' is not a YYYY-MM-DD date: {}", raw, e))
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub path: &'static str,
    pub field_type: FieldType,
}

const fn field(path: &'static str, field_type: FieldType) -> FieldDef {
    FieldDef { path, field_type }
}

static FIELDS: &[FieldDef] = &[
    field("uuid", FieldType::String),
    field("projectId", FieldType::Integer),
    field("customerName", FieldType::String),
    field("projectName", FieldType::String),
    field("description", FieldType::String),
    field("location", FieldType::String),
    field("startDate", FieldType::Date),
    field("endDate", FieldType::Date),
    field("archiveDate", FieldType::Date),
    field("engagementType", FieldType::String),
    field("engagementRegion", FieldType::String),
    field("timezone", FieldType::String),
    field("publicReference", FieldType::Boolean),
    field("lastUpdate", FieldType::String),
    field("creationDetails.createdByUser", FieldType::String),
    field("creationDetails.createdByEmail", FieldType::String),
    field("creationDetails.createdOn", FieldType::String),
    field("launch.launchedDateTime", FieldType::String),
    field("launch.launchedBy", FieldType::String),
    field("launch.launchedByEmail", FieldType::String),
    field("status.overallStatus", FieldType::String),
    field("commits.id", FieldType::String),
    field("commits.authorName", FieldType::String),
    field("commits.authorEmail", FieldType::String),
    field("categories.name", FieldType::String),
    field("categories.count", FieldType::Integer),
    field("artifacts.title", FieldType::String),
    field("artifacts.description", FieldType::String),
    field("artifacts.type", FieldType::String),
    field("artifacts.linkAddress", FieldType::String),
    field("hostingEnvironments.environmentName", FieldType::String),
    field("hostingEnvironments.ocpCloudProviderName", FieldType::String),
    field("hostingEnvironments.ocpClusterSize", FieldType::String),
    field("hostingEnvironments.ocpPersistentStorageSize", FieldType::String),
    field("hostingEnvironments.ocpSubDomain", FieldType::String),
    field("hostingEnvironments.ocpVersion", FieldType::String),
    field("engagementUsers.email", FieldType::String),
    field("engagementUsers.firstName", FieldType::String),
    field("engagementUsers.lastName", FieldType::String),
    field("engagementUsers.role", FieldType::String),
];

pub fn lookup(path: &str) -> Option<&'static FieldDef> {
    FIELDS.iter().find(|f| f.path == path)
}

pub fn all() -> &'static [FieldDef] {
    FIELDS
}

/// Coerce `raw` to the declared type of `path`.
pub fn coerce(path: &str, raw: &str) -> Result<JsonValue> {
    let def = lookup(path).ok_or_else(|| Error::search_field(path, "unknown field"))?;
    def.field_type
        .parse(raw)
        .map_err(|reason| Error::search_field(path, reason))
}
