//! # In-Memory Repository
//!
//! One [`RepositoryActor`] owns the documents of one collection and processes requests
//! sequentially, so the store needs no lock. [`RepositoryClient`] is the cheap, cloneable
//! handle that implements [`Repository`].
//!
//! Documents carry a managed `_meta` sub-document:
//!
//! | Field | Set on insert | On write / transition |
//! |-------|---------------|-----------------------|
//! | `status` | `DRAFT` | changed by publish / archive / unpublish |
//! | `version` | `1` | incremented when content changes |
//! | `created` | now | unchanged |
//! | `updated` | now | now |
//!
//! Lifecycle transitions:
//!
//! ```text
//! DRAFT ----publish----> PUBLISHED ----archive----> ARCHIVED
//!   ^                       |  ^                        |
//!   +------unpublish--------+  +--------publish---------+
//! ```
//!
//! Any other transition is refused with [`Outcome::Prevented`].
//!
//! [`MemoryConnection`] is the explicitly owned connection: opened once, hands out one
//! repository per collection, closed once.

use super::filter::{equality_fields, matches};
use super::{
    DeleteResult, EntityStatus, Outcome, PipelineStage, PreventedResult, Repository,
    RepositoryError, UpdateResult, WriteOptions,
};
use crate::config::MixinOptions;
use crate::ejson::{get_path, set_path, Bson, BsonExt, DateTime, Document, ObjectId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type Response<T> = oneshot::Sender<Result<T, RepositoryError>>;

/// Listing rules of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    pub allow_draft_listing: bool,
    pub allow_archive_listing: bool,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            allow_draft_listing: true,
            allow_archive_listing: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Publish,
    Archive,
    Unpublish,
}

impl Transition {
    fn operation(self) -> &'static str {
        match self {
            Transition::Publish => "publish",
            Transition::Archive => "archive",
            Transition::Unpublish => "unpublish",
        }
    }

    fn target(self) -> EntityStatus {
        match self {
            Transition::Publish => EntityStatus::Published,
            Transition::Archive => EntityStatus::Archived,
            Transition::Unpublish => EntityStatus::Draft,
        }
    }

    fn allowed_from(self, status: EntityStatus) -> bool {
        matches!(
            (self, status),
            (Transition::Publish, EntityStatus::Draft | EntityStatus::Archived)
                | (Transition::Archive, EntityStatus::Published)
                | (Transition::Unpublish, EntityStatus::Published)
        )
    }
}

struct WriteReport {
    result: UpdateResult,
    snapshot: Option<Document>,
}

enum RepositoryRequest {
    List {
        pipeline: Vec<PipelineStage>,
        respond_to: Response<Vec<Document>>,
    },
    ListByStatus {
        status: EntityStatus,
        respond_to: Response<Outcome<Vec<Document>>>,
    },
    Get {
        id: Bson,
        respond_to: Response<Option<Document>>,
    },
    Insert {
        document: Document,
        respond_to: Response<Document>,
    },
    Patch {
        filter: Document,
        patch: Document,
        upsert: bool,
        respond_to: Response<WriteReport>,
    },
    Replace {
        document: Document,
        upsert: bool,
        respond_to: Response<WriteReport>,
    },
    Delete {
        id: Bson,
        respond_to: Response<DeleteResult>,
    },
    Transition {
        id: Bson,
        transition: Transition,
        respond_to: Response<Outcome<UpdateResult>>,
    },
}

// =============================================================================
// ACTOR
// =============================================================================

/// Owns one collection.
pub struct RepositoryActor {
    collection: String,
    receiver: mpsc::Receiver<RepositoryRequest>,
    documents: Vec<Document>,
    policy: LifecyclePolicy,
}

impl RepositoryActor {
    pub fn new(
        collection: impl Into<String>,
        buffer_size: usize,
        policy: LifecyclePolicy,
    ) -> (Self, RepositoryClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            collection: collection.into(),
            receiver,
            documents: Vec::new(),
            policy,
        };
        (actor, RepositoryClient { sender })
    }

    pub async fn run(mut self) {
        info!(collection = %self.collection, "Repository started");
        while let Some(request) = self.receiver.recv().await {
            self.handle(request);
        }
        info!(collection = %self.collection, documents = self.documents.len(), "Repository closed");
    }

    fn handle(&mut self, request: RepositoryRequest) {
        match request {
            RepositoryRequest::List {
                pipeline,
                respond_to,
            } => {
                debug!(collection = %self.collection, stages = pipeline.len(), "List");
                let _ = respond_to.send(self.list(&pipeline));
            }
            RepositoryRequest::ListByStatus { status, respond_to } => {
                debug!(collection = %self.collection, %status, "List by status");
                let _ = respond_to.send(Ok(self.list_by_status(status)));
            }
            RepositoryRequest::Get { id, respond_to } => {
                let found = self.position(&id).map(|index| self.documents[index].clone());
                if found.is_none() {
                    debug!(collection = %self.collection, %id, "Get miss");
                }
                let _ = respond_to.send(Ok(found));
            }
            RepositoryRequest::Insert {
                document,
                respond_to,
            } => {
                let _ = respond_to.send(self.insert(document));
            }
            RepositoryRequest::Patch {
                filter,
                patch,
                upsert,
                respond_to,
            } => {
                let _ = respond_to.send(self.patch(&filter, patch, upsert));
            }
            RepositoryRequest::Replace {
                document,
                upsert,
                respond_to,
            } => {
                let _ = respond_to.send(self.replace(document, upsert));
            }
            RepositoryRequest::Delete { id, respond_to } => {
                let deleted = match self.position(&id) {
                    Some(index) => {
                        self.documents.remove(index);
                        info!(collection = %self.collection, %id, "Deleted");
                        1
                    }
                    None => 0,
                };
                let _ = respond_to.send(Ok(DeleteResult {
                    acknowledged: true,
                    deleted_count: deleted,
                }));
            }
            RepositoryRequest::Transition {
                id,
                transition,
                respond_to,
            } => {
                let _ = respond_to.send(self.transition(&id, transition));
            }
        }
    }

    fn position(&self, id: &Bson) -> Option<usize> {
        self.documents
            .iter()
            .position(|doc| doc.get("_id") == Some(id))
    }

    fn list(&self, pipeline: &[PipelineStage]) -> Result<Vec<Document>, RepositoryError> {
        let mut results = self.documents.clone();
        for stage in pipeline {
            match stage {
                PipelineStage::Match(filter) => {
                    let mut kept = Vec::with_capacity(results.len());
                    for doc in results {
                        if matches(&doc, filter)? {
                            kept.push(doc);
                        }
                    }
                    results = kept;
                }
                PipelineStage::Skip(n) => {
                    let n = usize::try_from(*n).unwrap_or(usize::MAX);
                    results = results.into_iter().skip(n).collect();
                }
                PipelineStage::Limit(n) => {
                    results.truncate(usize::try_from(*n).unwrap_or(usize::MAX));
                }
            }
        }
        Ok(results)
    }

    fn list_by_status(&self, status: EntityStatus) -> Outcome<Vec<Document>> {
        let (allowed, operation) = match status {
            EntityStatus::Draft => (self.policy.allow_draft_listing, "listDrafts"),
            EntityStatus::Archived => (self.policy.allow_archive_listing, "listArchive"),
            EntityStatus::Published => (true, "list"),
        };
        if !allowed {
            warn!(collection = %self.collection, operation, "Listing prevented");
            return Outcome::Prevented(PreventedResult::new(
                operation,
                format!("{} listing is disabled for {}", status, self.collection),
            ));
        }
        Outcome::Done(
            self.documents
                .iter()
                .filter(|doc| status_of(doc) == Some(status))
                .cloned()
                .collect(),
        )
    }

    fn insert(&mut self, mut document: Document) -> Result<Document, RepositoryError> {
        if let Some(id) = document.get("_id") {
            if self.position(id).is_some() {
                return Err(RepositoryError::DuplicateKey(id.to_string()));
            }
        } else {
            document = with_generated_id(document);
        }
        init_meta(&mut document);
        info!(collection = %self.collection, id = %id_of(&document), "Inserted");
        self.documents.push(document.clone());
        Ok(document)
    }

    fn patch(
        &mut self,
        filter: &Document,
        patch: Document,
        upsert: bool,
    ) -> Result<WriteReport, RepositoryError> {
        let mut position = None;
        for (index, doc) in self.documents.iter().enumerate() {
            if matches(doc, filter)? {
                position = Some(index);
                break;
            }
        }

        let Some(index) = position else {
            if !upsert {
                debug!(collection = %self.collection, "Patch matched nothing");
                return Ok(WriteReport {
                    result: acknowledged(0, 0),
                    snapshot: None,
                });
            }
            let mut seeded = equality_fields(filter);
            apply_patch(&mut seeded, patch)?;
            let stored = self.insert(seeded)?;
            return Ok(upserted(stored));
        };

        let before = self.documents[index].clone();
        let mut after = before.clone();
        apply_patch(&mut after, patch)?;
        let changed = after != before;
        if changed {
            touch(&mut after);
            info!(collection = %self.collection, id = %id_of(&after), "Patched");
            self.documents[index] = after;
        }
        Ok(WriteReport {
            result: acknowledged(1, u32::from(changed)),
            snapshot: Some(before),
        })
    }

    fn replace(&mut self, mut document: Document, upsert: bool) -> Result<WriteReport, RepositoryError> {
        document.remove("_meta");
        let index = document.get("_id").and_then(|id| self.position(id));

        let Some(index) = index else {
            if !upsert {
                debug!(collection = %self.collection, "Replace matched nothing");
                return Ok(WriteReport {
                    result: acknowledged(0, 0),
                    snapshot: None,
                });
            }
            let stored = self.insert(document)?;
            return Ok(upserted(stored));
        };

        let before = self.documents[index].clone();
        if let Some(meta) = before.get("_meta") {
            document.insert("_meta", meta.clone());
        }
        let changed = document != before;
        if changed {
            touch(&mut document);
            info!(collection = %self.collection, id = %id_of(&document), "Replaced");
            self.documents[index] = document;
        }
        Ok(WriteReport {
            result: acknowledged(1, u32::from(changed)),
            snapshot: Some(before),
        })
    }

    fn transition(
        &mut self,
        id: &Bson,
        transition: Transition,
    ) -> Result<Outcome<UpdateResult>, RepositoryError> {
        let index = self
            .position(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        let doc = &mut self.documents[index];
        let current = status_of(doc).unwrap_or(EntityStatus::Draft);

        if !transition.allowed_from(current) {
            warn!(collection = %self.collection, %id, %current, operation = transition.operation(), "Transition prevented");
            return Ok(Outcome::Prevented(PreventedResult::new(
                transition.operation(),
                format!("Cannot {} a {} document", transition.operation(), current),
            )));
        }

        set_path(doc, "_meta.status", Bson::from(transition.target().as_str()));
        touch(doc);
        info!(collection = %self.collection, %id, status = %transition.target(), "Transitioned");
        Ok(Outcome::Done(acknowledged(1, 1)))
    }
}

fn status_of(doc: &Document) -> Option<EntityStatus> {
    get_path(doc, "_meta.status")
        .and_then(Bson::as_str)
        .and_then(EntityStatus::parse)
}

/// `_id` goes first, ahead of the caller's fields.
fn with_generated_id(document: Document) -> Document {
    let mut with_id = Document::new();
    with_id.insert("_id", ObjectId::new());
    for (key, value) in document {
        with_id.insert(key, value);
    }
    with_id
}

fn id_of(doc: &Document) -> &Bson {
    doc.get("_id").unwrap_or(&Bson::Null)
}

fn init_meta(doc: &mut Document) {
    let now = Bson::DateTime(DateTime::now());
    let mut meta = Document::new();
    meta.insert("status", Bson::from(EntityStatus::Draft.as_str()));
    meta.insert("version", Bson::Int32(1));
    meta.insert("created", now.clone());
    meta.insert("updated", now);
    doc.insert("_meta", Bson::Document(meta));
}

fn touch(doc: &mut Document) {
    let version = get_path(doc, "_meta.version")
        .and_then(BsonExt::as_integer)
        .unwrap_or(0);
    let next = i32::try_from(version + 1).unwrap_or(i32::MAX);
    set_path(doc, "_meta.version", Bson::Int32(next));
    set_path(doc, "_meta.updated", Bson::DateTime(DateTime::now()));
}

fn apply_patch(doc: &mut Document, patch: Document) -> Result<(), RepositoryError> {
    for (path, value) in patch {
        if path == "_id" {
            match doc.get("_id") {
                Some(existing) if *existing != value => {
                    return Err(RepositoryError::InvalidDocument("_id is immutable".into()));
                }
                Some(_) => continue,
                None => {}
            }
        }
        if path == "_meta" || path.starts_with("_meta.") {
            return Err(RepositoryError::InvalidDocument(
                "_meta is managed by the repository".into(),
            ));
        }
        set_path(doc, &path, value);
    }
    Ok(())
}

fn acknowledged(matched: u32, modified: u32) -> UpdateResult {
    UpdateResult {
        acknowledged: true,
        matched_count: matched,
        modified_count: modified,
        upserted_count: 0,
        upserted_id: None,
    }
}

fn upserted(stored: Document) -> WriteReport {
    WriteReport {
        result: UpdateResult {
            acknowledged: true,
            matched_count: 0,
            modified_count: 0,
            upserted_count: 1,
            upserted_id: stored.get("_id").cloned(),
        },
        snapshot: None,
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// Handle to a [`RepositoryActor`].
#[derive(Debug, Clone)]
pub struct RepositoryClient {
    sender: mpsc::Sender<RepositoryRequest>,
}

impl RepositoryClient {
    async fn request<T>(
        &self,
        build: impl FnOnce(Response<T>) -> RepositoryRequest,
    ) -> Result<T, RepositoryError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| RepositoryError::Closed)?;
        response.await.map_err(|_| RepositoryError::Dropped)?
    }

    async fn write(
        &self,
        options: &mut WriteOptions,
        build: impl FnOnce(bool, Response<WriteReport>) -> RepositoryRequest,
    ) -> Result<UpdateResult, RepositoryError> {
        let upsert = options.upsert.unwrap_or(false);
        let report = self.request(|respond_to| build(upsert, respond_to)).await?;
        if let (Some(slot), Some(pre_image)) = (options.snapshot.as_mut(), report.snapshot) {
            *slot = pre_image;
        }
        Ok(report.result)
    }

    async fn transition(
        &self,
        id: Bson,
        transition: Transition,
    ) -> Result<Outcome<UpdateResult>, RepositoryError> {
        self.request(|respond_to| RepositoryRequest::Transition {
            id,
            transition,
            respond_to,
        })
        .await
    }
}

#[async_trait]
impl Repository for RepositoryClient {
    async fn list(&self, pipeline: Vec<PipelineStage>) -> Result<Vec<Document>, RepositoryError> {
        self.request(|respond_to| RepositoryRequest::List {
            pipeline,
            respond_to,
        })
        .await
    }

    async fn list_drafts(&self) -> Result<Outcome<Vec<Document>>, RepositoryError> {
        self.request(|respond_to| RepositoryRequest::ListByStatus {
            status: EntityStatus::Draft,
            respond_to,
        })
        .await
    }

    async fn list_archive(&self) -> Result<Outcome<Vec<Document>>, RepositoryError> {
        self.request(|respond_to| RepositoryRequest::ListByStatus {
            status: EntityStatus::Archived,
            respond_to,
        })
        .await
    }

    async fn get(&self, id: Bson) -> Result<Option<Document>, RepositoryError> {
        self.request(|respond_to| RepositoryRequest::Get { id, respond_to })
            .await
    }

    async fn insert_one(&self, document: Document) -> Result<Document, RepositoryError> {
        self.request(|respond_to| RepositoryRequest::Insert {
            document,
            respond_to,
        })
        .await
    }

    async fn patch_one(
        &self,
        filter: Document,
        patch: Document,
        options: &mut WriteOptions,
    ) -> Result<UpdateResult, RepositoryError> {
        self.write(options, |upsert, respond_to| RepositoryRequest::Patch {
            filter,
            patch,
            upsert,
            respond_to,
        })
        .await
    }

    async fn replace_one(
        &self,
        document: Document,
        options: &mut WriteOptions,
    ) -> Result<UpdateResult, RepositoryError> {
        self.write(options, |upsert, respond_to| RepositoryRequest::Replace {
            document,
            upsert,
            respond_to,
        })
        .await
    }

    async fn delete_one_by_id(&self, id: Bson) -> Result<DeleteResult, RepositoryError> {
        self.request(|respond_to| RepositoryRequest::Delete { id, respond_to })
            .await
    }

    async fn publish_by_id(&self, id: Bson) -> Result<Outcome<UpdateResult>, RepositoryError> {
        self.transition(id, Transition::Publish).await
    }

    async fn archive_by_id(&self, id: Bson) -> Result<Outcome<UpdateResult>, RepositoryError> {
        self.transition(id, Transition::Archive).await
    }

    async fn unpublish_by_id(&self, id: Bson) -> Result<Outcome<UpdateResult>, RepositoryError> {
        self.transition(id, Transition::Unpublish).await
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

/// Source of per-collection repositories.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn repository(&self, collection: &str) -> Result<Arc<dyn Repository>, RepositoryError>;
}

#[derive(Default)]
struct ConnectionState {
    clients: HashMap<String, RepositoryClient>,
    handles: Vec<JoinHandle<()>>,
    closed: bool,
}

/// In-process connection for `memory://` uris.
///
/// Collections are created on first use. [`MemoryConnection::close`] waits for every
/// collection actor to finish, so it must run after the services holding repositories have
/// been dropped.
pub struct MemoryConnection {
    uri: String,
    db_name: String,
    buffer_size: usize,
    policies: HashMap<String, LifecyclePolicy>,
    state: Mutex<ConnectionState>,
}

impl MemoryConnection {
    pub const SCHEME: &'static str = "memory://";

    pub fn open(options: &MixinOptions) -> Result<Self, RepositoryError> {
        if !options.uri.starts_with(Self::SCHEME) {
            return Err(RepositoryError::UnsupportedUri(options.uri.clone()));
        }
        info!(db = %options.db_name, uri = %options.uri, "Connection opened");
        Ok(Self {
            uri: options.uri.clone(),
            db_name: options.db_name.clone(),
            buffer_size: 32,
            policies: HashMap::new(),
            state: Mutex::new(ConnectionState::default()),
        })
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Overrides the listing policy of one collection.
    pub fn with_policy(mut self, collection: impl Into<String>, policy: LifecyclePolicy) -> Self {
        self.policies.insert(collection.into(), policy);
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// Returns the client of `collection`, spawning its actor on first use.
    pub async fn client(&self, collection: &str) -> Result<RepositoryClient, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(RepositoryError::Closed);
        }
        if let Some(client) = state.clients.get(collection) {
            return Ok(client.clone());
        }
        let policy = self.policies.get(collection).copied().unwrap_or_default();
        let (actor, client) = RepositoryActor::new(collection, self.buffer_size, policy);
        state.handles.push(tokio::spawn(actor.run()));
        state.clients.insert(collection.to_string(), client.clone());
        debug!(db = %self.db_name, collection, "Collection opened");
        Ok(client)
    }

    /// Closes every collection and waits for their actors to stop.
    pub async fn close(&self) {
        let handles = {
            let mut state = self.state.lock().await;
            state.closed = true;
            state.clients.clear();
            std::mem::take(&mut state.handles)
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Repository task failed");
            }
        }
        info!(db = %self.db_name, "Connection closed");
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn repository(&self, collection: &str) -> Result<Arc<dyn Repository>, RepositoryError> {
        Ok(Arc::new(self.client(collection).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ejson::from_json;
    use crate::repository::filter::by_id;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        from_json(value).unwrap().into_document().unwrap()
    }

    fn spawn(policy: LifecyclePolicy) -> RepositoryClient {
        let (actor, client) = RepositoryActor::new("articles", 8, policy);
        tokio::spawn(actor.run());
        client
    }

    #[tokio::test]
    async fn insert_assigns_id_and_meta() {
        let repo = spawn(LifecyclePolicy::default());
        let stored = repo.insert_one(doc(json!({"name": "a"}))).await.unwrap();

        assert!(stored.get("_id").unwrap().as_object_id().is_some());
        assert_eq!(stored.keys().next().map(String::as_str), Some("_id"));
        assert_eq!(get_path(&stored, "_meta.status"), Some(&Bson::from("DRAFT")));
        assert_eq!(get_path(&stored, "_meta.version"), Some(&Bson::Int32(1)));

        let fetched = repo.get(stored.get("_id").unwrap().clone()).await.unwrap();
        assert_eq!(fetched, Some(stored));
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let repo = spawn(LifecyclePolicy::default());
        repo.insert_one(doc(json!({"_id": 1}))).await.unwrap();
        let err = repo.insert_one(doc(json!({"_id": 1}))).await.unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn patch_fills_snapshot_and_bumps_version() {
        let repo = spawn(LifecyclePolicy::default());
        let stored = repo.insert_one(doc(json!({"name": "a"}))).await.unwrap();
        let id = stored.get("_id").unwrap().clone();

        let mut options = WriteOptions::with_snapshot();
        let result = repo
            .patch_one(by_id(id.clone()), doc(json!({"name": "b"})), &mut options)
            .await
            .unwrap();

        assert_eq!(result.matched_count, 1);
        assert_eq!(result.modified_count, 1);
        assert_eq!(options.snapshot, Some(stored));
        let after = repo.get(id).await.unwrap().unwrap();
        assert_eq!(after.get("name"), Some(&Bson::from("b")));
        assert_eq!(get_path(&after, "_meta.version"), Some(&Bson::Int32(2)));
    }

    #[tokio::test]
    async fn patch_without_match_upserts_only_when_asked() {
        let repo = spawn(LifecyclePolicy::default());
        let filter = doc(json!({"slug": "x"}));

        let mut plain = WriteOptions::with_snapshot();
        let missed = repo
            .patch_one(filter.clone(), doc(json!({"n": 1})), &mut plain)
            .await
            .unwrap();
        assert_eq!(missed.matched_count, 0);
        assert_eq!(plain.snapshot, Some(Document::new()));

        let mut upsert = WriteOptions::with_snapshot().upsert();
        let created = repo
            .patch_one(filter.clone(), doc(json!({"n": 1})), &mut upsert)
            .await
            .unwrap();
        assert_eq!(created.upserted_count, 1);

        let listed = repo.list(vec![PipelineStage::Match(filter)]).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].get("n"), Some(&Bson::Int32(1)));
    }

    #[tokio::test]
    async fn replace_keeps_meta() {
        let repo = spawn(LifecyclePolicy::default());
        let stored = repo.insert_one(doc(json!({"_id": 7, "name": "a"}))).await.unwrap();

        let mut options = WriteOptions::with_snapshot();
        let result = repo
            .replace_one(doc(json!({"_id": 7, "title": "t"})), &mut options)
            .await
            .unwrap();
        assert_eq!(result.modified_count, 1);
        assert_eq!(options.snapshot, Some(stored));

        let after = repo.get(Bson::Int32(7)).await.unwrap().unwrap();
        assert!(after.get("name").is_none());
        assert_eq!(get_path(&after, "_meta.version"), Some(&Bson::Int32(2)));
    }

    #[tokio::test]
    async fn lifecycle_transitions() {
        let repo = spawn(LifecyclePolicy::default());
        repo.insert_one(doc(json!({"_id": "a"}))).await.unwrap();
        let id = Bson::from("a");

        assert!(repo.archive_by_id(id.clone()).await.unwrap().is_prevented());
        assert!(!repo.publish_by_id(id.clone()).await.unwrap().is_prevented());
        assert!(repo.publish_by_id(id.clone()).await.unwrap().is_prevented());
        assert!(!repo.archive_by_id(id.clone()).await.unwrap().is_prevented());

        let archived = repo.list_archive().await.unwrap().into_result().unwrap();
        assert_eq!(archived.len(), 1);
        assert!(repo.list_drafts().await.unwrap().into_result().unwrap().is_empty());

        let missing = repo.publish_by_id(Bson::from("nope")).await;
        assert!(matches!(missing, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn listing_policy_prevents() {
        let repo = spawn(LifecyclePolicy {
            allow_draft_listing: false,
            allow_archive_listing: true,
        });
        let outcome = repo.list_drafts().await.unwrap();
        let prevented = outcome.into_result().unwrap_err();
        assert_eq!(prevented.operation, "listDrafts");
    }

    #[tokio::test]
    async fn pipeline_skip_and_limit() {
        let repo = spawn(LifecyclePolicy::default());
        for n in 0..5 {
            repo.insert_one(doc(json!({"n": n}))).await.unwrap();
        }
        let page = repo
            .list(vec![PipelineStage::Skip(2), PipelineStage::Limit(2)])
            .await
            .unwrap();
        let ns: Vec<_> = page.iter().map(|d| d.get("n").unwrap().clone()).collect();
        assert_eq!(ns, vec![Bson::Int32(2), Bson::Int32(3)]);
    }

    #[tokio::test]
    async fn connection_shares_collections_and_closes() {
        let options = MixinOptions::new("blog");
        let connection = MemoryConnection::open(&options).unwrap();
        let a = connection.repository("articles").await.unwrap();
        let b = connection.repository("articles").await.unwrap();
        a.insert_one(doc(json!({"_id": 1}))).await.unwrap();
        assert!(b.get(Bson::Int32(1)).await.unwrap().is_some());

        drop((a, b));
        connection.close().await;
        assert!(matches!(
            connection.client("articles").await,
            Err(RepositoryError::Closed)
        ));
    }

    #[test]
    fn rejects_foreign_uris() {
        let mut options = MixinOptions::new("blog");
        options.uri = "mongodb://localhost:27017".into();
        assert!(matches!(
            MemoryConnection::open(&options),
            Err(RepositoryError::UnsupportedUri(_))
        ));
    }
}
