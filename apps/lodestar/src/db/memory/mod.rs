//! In-memory document store
//!
//! Evaluates pipelines in-process over a vector of JSON documents. Used by
//! tests and by the query CLI.

mod eval;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db::document::{set_path, Document, ID_FIELD};
use crate::db::pipeline::{Pipeline, Projection, UpdateDocument};
use crate::db::search::predicate::Predicate;
use crate::db::traits::DocumentStore;
use crate::Result;

/// A collection held in memory, in insertion order.
///
/// Clones share the same collection.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    documents: Arc<RwLock<Vec<Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with `documents`; missing internal ids are assigned.
    pub fn with_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let documents = documents.into_iter().map(with_id).collect();
        Self {
            documents: Arc::new(RwLock::new(documents)),
        }
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Copy of every stored document.
    pub async fn snapshot(&self) -> Vec<Document> {
        self.documents.read().await.clone()
    }
}

fn with_id(mut document: Document) -> Document {
    if !document.contains_key(ID_FIELD) {
        document.insert(
            ID_FIELD.to_string(),
            JsonValue::String(uuid::Uuid::new_v4().simple().to_string()),
        );
    }
    document
}

fn into_documents(values: Vec<JsonValue>) -> Vec<Document> {
    values
        .into_iter()
        .filter_map(|value| match value {
            JsonValue::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, document: Document) -> Result<Document> {
        let document = with_id(document);
        self.documents.write().await.push(document.clone());
        Ok(document)
    }

    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>> {
        let input: Vec<JsonValue> = self
            .documents
            .read()
            .await
            .iter()
            .cloned()
            .map(JsonValue::Object)
            .collect();
        let output = eval::run(pipeline, input)?;
        Ok(into_documents(output))
    }

    async fn find_one(
        &self,
        filter: &Predicate,
        projection: Option<&Projection>,
    ) -> Result<Option<Document>> {
        let documents = self.documents.read().await;
        let found = documents
            .iter()
            .map(|doc| JsonValue::Object(doc.clone()))
            .find(|doc| filter.matches(doc));

        Ok(found
            .map(|doc| match projection {
                Some(projection) => eval::exec_project(&doc, projection),
                None => doc,
            })
            .and_then(|doc| match doc {
                JsonValue::Object(map) => Some(map),
                _ => None,
            }))
    }

    async fn find_one_and_update(
        &self,
        filter: &Predicate,
        update: &UpdateDocument,
    ) -> Result<Option<Document>> {
        // The write lock covers both the match and the write.
        let mut documents = self.documents.write().await;
        let Some(target) = documents
            .iter_mut()
            .find(|doc| filter.matches(&JsonValue::Object((*doc).clone())))
        else {
            return Ok(None);
        };

        for (path, value) in &update.set {
            set_path(target, path, value.clone());
        }
        Ok(Some(target.clone()))
    }
}
