//! Error types for the engagement core

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid search field '{field}': {reason}")]
    InvalidSearchField { field: String, reason: String },

    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("Invalid engagement: {0}")]
    InvalidEngagement(String),

    #[error("Engagement not found: {uuid}")]
    EngagementNotFound { uuid: String },

    #[error("Version conflict for engagement {uuid}: expected lastUpdate {expected}")]
    VersionConflict { uuid: String, expected: String },

    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Store operation '{operation}' timed out after {timeout:?}")]
    StoreTimeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn search_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidSearchField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// HTTP status the resource layer reports for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidFilter(_)
            | Error::InvalidSearchField { .. }
            | Error::InvalidEngagement(_) => 400,
            Error::EngagementNotFound { .. } => 404,
            Error::VersionConflict { .. } | Error::BusinessRule(_) => 409,
            Error::StoreTimeout { .. } => 504,
            Error::InvalidPipeline(_)
            | Error::Store(_)
            | Error::Serialization(_)
            | Error::Config(_)
            | Error::Other(_) => {
                tracing::error!("Internal error: {}", self);
                500
            }
        }
    }

    /// Conflicts are expected outcomes of concurrent editing and may be retried
    /// by the caller after re-fetching.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::VersionConflict { .. })
    }
}
