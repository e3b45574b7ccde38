//! Core traits for engagement storage backends

use async_trait::async_trait;

use crate::db::document::Document;
use crate::db::pipeline::{Pipeline, Projection, UpdateDocument};
use crate::db::search::predicate::Predicate;
use crate::Result;

/// Storage trait for the engagement collection
///
/// This trait defines the store operations the query and update core
/// needs. Any document database offering an aggregation pipeline and an
/// atomic find-and-modify (MongoDB, an in-memory store, an HTTP proxy, etc.)
/// can implement it.
///
/// Store failures are returned as-is; callers do not retry.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document
    ///
    /// # Returns
    /// The stored document, with the internal id assigned when it was absent
    async fn insert(&self, document: Document) -> Result<Document>;

    /// Run an aggregation pipeline over the collection
    ///
    /// # Returns
    /// The output documents in pipeline order
    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>>;

    /// Find the first document matching `filter`
    ///
    /// # Arguments
    /// * `filter` - Match predicate
    /// * `projection` - Optional field projection applied to the match
    ///
    /// # Returns
    /// * `Ok(Some(document))` - First match in store order
    /// * `Ok(None)` - No document matched
    async fn find_one(
        &self,
        filter: &Predicate,
        projection: Option<&Projection>,
    ) -> Result<Option<Document>>;

    /// Atomically apply `update` to the first document matching `filter`
    ///
    /// Matching and writing happen as one step: no other write can land
    /// between them.
    ///
    /// # Returns
    /// * `Ok(Some(document))` - The document after the update
    /// * `Ok(None)` - No document matched; nothing was written
    async fn find_one_and_update(
        &self,
        filter: &Predicate,
        update: &UpdateDocument,
    ) -> Result<Option<Document>>;
}
