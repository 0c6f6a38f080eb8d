//! An extended-JSON service that keeps snapshots of articles.
//!
//! `audit.snapshot {id}` fetches the article through the broker and stores a copy stamped
//! with the capture time; `audit.history {id}` returns the stored copies, oldest first.
//! Object ids and dates stay typed the whole way.

use crate::model::Article;
use async_trait::async_trait;
use entity_service::ejson::{Bson, BsonExt, DateTime, Document};
use entity_service::entity::Entity;
use entity_service::{call_remote, EjsonActions, ServiceError};
use service_broker::{ActionDef, CallOptions, Context};
use tokio::sync::Mutex;
use tracing::info;

#[derive(Default)]
pub struct AuditLog {
    snapshots: Mutex<Vec<Document>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    async fn snapshot(&self, ctx: &Context, id: Bson) -> Result<Bson, ServiceError> {
        let mut params = Document::new();
        params.insert("id", id.clone());
        let action = format!("{}.getById", Article::full_name());
        let article = call_remote(ctx, &action, &Bson::Document(params), CallOptions::new()).await?;
        if article.is_null() {
            return Ok(Bson::Null);
        }

        let mut entry = Document::new();
        entry.insert("articleId", id.clone());
        entry.insert("capturedAt", Bson::DateTime(DateTime::now()));
        entry.insert("article", article);
        self.snapshots.lock().await.push(entry.clone());
        info!(%id, "Snapshot stored");
        Ok(Bson::Document(entry))
    }

    async fn history(&self, id: &Bson) -> Bson {
        let snapshots = self.snapshots.lock().await;
        Bson::Array(
            snapshots
                .iter()
                .filter(|entry| entry.get("articleId") == Some(id))
                .cloned()
                .map(Bson::Document)
                .collect(),
        )
    }
}

#[async_trait]
impl EjsonActions for AuditLog {
    fn name(&self) -> &str {
        "audit"
    }

    fn actions(&self) -> Vec<ActionDef> {
        vec![ActionDef::internal("snapshot"), ActionDef::rest("history", "GET /:id")]
    }

    async fn handle(&self, ctx: &mut Context, params: Bson) -> Result<Bson, ServiceError> {
        let id = params
            .as_document()
            .and_then(|doc| doc.get("id"))
            .cloned()
            .ok_or(ServiceError::MissingId)
            .and_then(Article::parse_id)?;
        match ctx.action_name() {
            "snapshot" => self.snapshot(ctx, id).await,
            _ => Ok(self.history(&id).await),
        }
    }
}
