//! Optimistic concurrency for engagement updates
//!
//! Every write is a compare-and-swap on `lastUpdate`: the update applies only
//! when the stored token still equals the one the caller read, and the write
//! itself stamps a new token. A stale token finds no document, which the
//! caller reports as a conflict.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::db::document::Document;
use crate::db::pipeline::UpdateDocument;
use crate::db::search::predicate::Predicate;
use crate::db::traits::DocumentStore;
use crate::error::Error;
use crate::Result;

pub const UUID_FIELD: &str = "uuid";
pub const VERSION_FIELD: &str = "lastUpdate";
pub const LAUNCH_FIELD: &str = "launch";

/// Server-owned fields an update never takes from the caller.
pub const IMMUTABLE_FIELDS: &[&str] = &[
    "uuid",
    "_id",
    "projectId",
    "creationDetails",
    "status",
    "commits",
    "launch",
];

const VERSION_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9fZ";

static LAST_VERSION_NANOS: AtomicI64 = AtomicI64::new(0);

/// A fresh version token, strictly later than every token issued before it
/// by this process.
pub fn next_version_token() -> String {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
    let mut previous = LAST_VERSION_NANOS.load(Ordering::Relaxed);
    let nanos = loop {
        let candidate = now.max(previous.saturating_add(1));
        match LAST_VERSION_NANOS.compare_exchange_weak(
            previous,
            candidate,
            Ordering::SeqCst,
            Ordering::Relaxed,
        ) {
            Ok(_) => break candidate,
            Err(actual) => previous = actual,
        }
    };
    DateTime::<Utc>::from_timestamp_nanos(nanos)
        .format(VERSION_FORMAT)
        .to_string()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConcurrencyGuard;

impl ConcurrencyGuard {
    pub fn new() -> Self {
        Self
    }

    pub fn is_immutable(field: &str, allow_launch_overwrite: bool) -> bool {
        IMMUTABLE_FIELDS.contains(&field) && !(allow_launch_overwrite && field == LAUNCH_FIELD)
    }

    /// The `$set` for `candidate`: every mutable field, plus a fresh version token.
    pub fn update_document(
        &self,
        candidate: &Document,
        allow_launch_overwrite: bool,
    ) -> UpdateDocument {
        let mut set: Document = candidate
            .iter()
            .filter(|(field, _)| !Self::is_immutable(field, allow_launch_overwrite))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();

        // The caller's token is the CAS comparand, never the new value.
        set.insert(
            VERSION_FIELD.to_string(),
            JsonValue::String(next_version_token()),
        );
        UpdateDocument { set }
    }

    pub fn version_filter(uuid: &str, expected_version: &str) -> Predicate {
        Predicate::eq(UUID_FIELD, uuid).and(Predicate::eq(VERSION_FIELD, expected_version))
    }

    /// Apply `candidate` iff the stored `lastUpdate` equals `expected_version`.
    ///
    /// # Returns
    /// * `Ok(Some(document))` - Post-update document
    /// * `Ok(None)` - No engagement with that uuid and version
    pub async fn update_if_version_matches<S>(
        &self,
        store: &S,
        candidate: &Document,
        expected_version: &str,
        allow_launch_overwrite: bool,
    ) -> Result<Option<Document>>
    where
        S: DocumentStore + ?Sized,
    {
        let uuid = candidate
            .get(UUID_FIELD)
            .and_then(JsonValue::as_str)
            .ok_or_else(|| {
                Error::InvalidEngagement("update candidate has no uuid".to_string())
            })?;

        let filter = Self::version_filter(uuid, expected_version);
        let update = self.update_document(candidate, allow_launch_overwrite);

        let updated = store.find_one_and_update(&filter, &update).await?;
        match &updated {
            Some(_) => tracing::info!(
                uuid = %uuid,
                version = ?update.set.get(VERSION_FIELD),
                "Engagement updated"
            ),
            None => tracing::debug!(
                uuid = %uuid,
                expected_version = %expected_version,
                "Version check found no engagement"
            ),
        }
        Ok(updated)
    }
}
