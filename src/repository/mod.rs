//! # Repository Interface
//!
//! Entity services persist through the [`Repository`] trait. The trait mirrors the document
//! repository the handlers were designed against: listing through a pipeline, point reads by
//! id, writes that report a pre-image snapshot through [`WriteOptions`], and lifecycle
//! transitions between [`EntityStatus`] values.
//!
//! Operations a repository may refuse by policy return an [`Outcome`]. A
//! [`Outcome::Prevented`] is a normal value inside the call chain; it becomes an error only
//! when a handler returns it to the broker.
//!
//! [`memory`] provides the in-process reference implementation.

pub mod filter;
pub mod memory;

use crate::ejson::{Bson, Document};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use memory::{Connection, LifecyclePolicy, MemoryConnection, RepositoryActor, RepositoryClient};

/// Errors reported by a repository.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    #[error("Repository closed")]
    Closed,
    #[error("Repository dropped response channel")]
    Dropped,
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),
    #[error("Unsupported connection uri: {0}")]
    UnsupportedUri(String),
}

/// Publication status stored under `_meta.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityStatus {
    Draft,
    Published,
    Archived,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Draft => "DRAFT",
            EntityStatus::Published => "PUBLISHED",
            EntityStatus::Archived => "ARCHIVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(EntityStatus::Draft),
            "PUBLISHED" => Some(EntityStatus::Published),
            "ARCHIVED" => Some(EntityStatus::Archived),
            _ => None,
        }
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An intentional refusal, distinct from a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreventedResult {
    /// The refused operation, e.g. `listDrafts` or `publish`.
    pub operation: String,
    pub reason: String,
}

impl PreventedResult {
    pub fn new(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PreventedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} prevented: {}", self.operation, self.reason)
    }
}

/// Result of an operation the repository may refuse.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    Prevented(PreventedResult),
}

impl<T> Outcome<T> {
    pub fn is_prevented(&self) -> bool {
        matches!(self, Outcome::Prevented(_))
    }

    pub fn into_result(self) -> Result<T, PreventedResult> {
        match self {
            Outcome::Done(value) => Ok(value),
            Outcome::Prevented(prevented) => Err(prevented),
        }
    }
}

/// Options for [`Repository::patch_one`] and [`Repository::replace_one`].
///
/// `upsert: None` means the option is absent, which is not the same as `Some(false)` for
/// repositories that act on the option's presence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOptions {
    pub upsert: Option<bool>,
    /// Filled by the repository with the matched document as it was before the write.
    pub snapshot: Option<Document>,
}

impl WriteOptions {
    /// Options that request a pre-image snapshot.
    pub fn with_snapshot() -> Self {
        Self {
            upsert: None,
            snapshot: Some(Document::new()),
        }
    }

    pub fn upsert(mut self) -> Self {
        self.upsert = Some(true);
        self
    }
}

/// Outcome of a patch, replace or lifecycle transition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u32,
    pub modified_count: u32,
    pub upserted_count: u32,
    pub upserted_id: Option<Bson>,
}

impl UpdateResult {
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("acknowledged", Bson::Boolean(self.acknowledged));
        doc.insert("matchedCount", count(self.matched_count));
        doc.insert("modifiedCount", count(self.modified_count));
        doc.insert("upsertedCount", count(self.upserted_count));
        doc.insert(
            "upsertedId",
            self.upserted_id.clone().unwrap_or(Bson::Null),
        );
        doc
    }
}

/// Outcome of a delete.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u32,
}

impl DeleteResult {
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("acknowledged", Bson::Boolean(self.acknowledged));
        doc.insert("deletedCount", count(self.deleted_count));
        doc
    }
}

fn count(n: u32) -> Bson {
    Bson::Int32(i32::try_from(n).unwrap_or(i32::MAX))
}

/// One stage of a list pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStage {
    Match(Document),
    Skip(u64),
    Limit(u64),
}

impl PipelineStage {
    /// `{"$match": {"_meta.status": {"$in": [...]}}}`
    pub fn status_in(statuses: &[EntityStatus]) -> Self {
        let mut clause = Document::new();
        clause.insert(
            "$in",
            Bson::Array(statuses.iter().map(|s| Bson::from(s.as_str())).collect()),
        );
        let mut filter = Document::new();
        filter.insert("_meta.status", Bson::Document(clause));
        PipelineStage::Match(filter)
    }

    /// The stage in aggregation-pipeline form.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        match self {
            PipelineStage::Match(filter) => {
                doc.insert("$match", Bson::Document(filter.clone()));
            }
            PipelineStage::Skip(n) => {
                doc.insert("$skip", Bson::Int64(i64::try_from(*n).unwrap_or(i64::MAX)));
            }
            PipelineStage::Limit(n) => {
                doc.insert("$limit", Bson::Int64(i64::try_from(*n).unwrap_or(i64::MAX)));
            }
        }
        doc
    }
}

/// The document repository consumed by entity services.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn list(&self, pipeline: Vec<PipelineStage>) -> Result<Vec<Document>, RepositoryError>;

    async fn list_drafts(&self) -> Result<Outcome<Vec<Document>>, RepositoryError>;

    async fn list_archive(&self) -> Result<Outcome<Vec<Document>>, RepositoryError>;

    async fn get(&self, id: Bson) -> Result<Option<Document>, RepositoryError>;

    /// Inserts and returns the stored document (with `_id` and `_meta`).
    async fn insert_one(&self, document: Document) -> Result<Document, RepositoryError>;

    async fn patch_one(
        &self,
        filter: Document,
        patch: Document,
        options: &mut WriteOptions,
    ) -> Result<UpdateResult, RepositoryError>;

    /// Replaces the document with the same `_id`.
    async fn replace_one(
        &self,
        document: Document,
        options: &mut WriteOptions,
    ) -> Result<UpdateResult, RepositoryError>;

    async fn delete_one_by_id(&self, id: Bson) -> Result<DeleteResult, RepositoryError>;

    async fn publish_by_id(&self, id: Bson) -> Result<Outcome<UpdateResult>, RepositoryError>;

    async fn archive_by_id(&self, id: Bson) -> Result<Outcome<UpdateResult>, RepositoryError>;

    async fn unpublish_by_id(&self, id: Bson) -> Result<Outcome<UpdateResult>, RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ejson::serialize;
    use serde_json::json;

    #[test]
    fn status_stage_shape() {
        let stage = PipelineStage::status_in(&[EntityStatus::Published, EntityStatus::Draft]);
        assert_eq!(
            serialize(&Bson::Document(stage.to_document())),
            json!({"$match": {"_meta.status": {"$in": ["PUBLISHED", "DRAFT"]}}})
        );
    }

    #[test]
    fn update_result_wire_shape() {
        let result = UpdateResult {
            acknowledged: true,
            matched_count: 1,
            modified_count: 1,
            ..Default::default()
        };
        assert_eq!(
            serialize(&Bson::Document(result.to_document())),
            json!({
                "acknowledged": true,
                "matchedCount": 1,
                "modifiedCount": 1,
                "upsertedCount": 0,
                "upsertedId": null
            })
        );
    }

    #[test]
    fn prevented_outcomes_convert_to_errors() {
        let outcome: Outcome<()> =
            Outcome::Prevented(PreventedResult::new("listDrafts", "disabled"));
        assert!(outcome.is_prevented());
        assert_eq!(outcome.into_result().unwrap_err().reason, "disabled");
    }
}
