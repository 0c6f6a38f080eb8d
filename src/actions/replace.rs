use super::patch::required_document;
use super::{decode_document, flag, forward_query_value, serialize_document, stop_propagation, EntityAction};
use crate::call::call_remote;
use crate::ejson::{self, Bson, BsonExt, Document};
use crate::entity::Entity;
use crate::error::ServiceError;
use crate::params::unmerge_and_validate;
use crate::repository::WriteOptions;
use crate::service::EntityService;
use serde_json::{Map, Value};
use service_broker::Context;

impl<E: Entity> EntityService<E> {
    /// `PUT /`: forwards `{document, upsert, stopPropagation}` to `replaceOne`.
    pub(crate) async fn replace_one_rest(&self, ctx: &mut Context) -> Result<Value, ServiceError> {
        let mut params = unmerge_and_validate(ctx, &self.schemas().replace_one, &[])?;
        let document = decode_document(params.take_body(), "document")?;

        let mut forward = Document::new();
        forward.insert("document", Bson::Document(document));
        forward_query_value(&params, "upsert", &mut forward)?;
        forward_query_value(&params, "stopPropagation", &mut forward)?;

        let (action, options) = Self::internal_call(ctx, EntityAction::ReplaceOne);
        let result = call_remote(&*ctx, &action, &Bson::Document(forward), options).await?;
        Ok(ejson::serialize(&result))
    }

    /// Replaces the document with the same `_id`.
    ///
    /// Without `upsert` the repository receives no upsert option at all.
    pub(crate) async fn replace_one(&self, ctx: &mut Context) -> Result<Value, ServiceError> {
        let params = decode_document(ctx.params.clone(), "params")?;
        let document = required_document(&params, "document")?;

        let mut options = WriteOptions::with_snapshot();
        if flag(&ctx.params, "upsert") {
            options = options.upsert();
        }
        let result = self
            .repository()
            .await?
            .replace_one(document.clone(), &mut options)
            .await?;
        let serialized = serialize_document(result.to_document());

        if !stop_propagation(&ctx.params) {
            let mut payload = Map::new();
            let id = params
                .get("id")
                .or_else(|| document.get("_id"))
                .filter(|id| !id.is_null());
            if let Some(id) = id {
                payload.insert("id".into(), ejson::serialize(id));
            }
            payload.insert("result".into(), serialized.clone());
            payload.insert("old".into(), serialize_document(options.snapshot.unwrap_or_default()));
            payload.insert("document".into(), serialize_document(document.clone()));
            if let Some(upsert) = ctx.params.get("upsert") {
                payload.insert("upsert".into(), upsert.clone());
            }
            self.emit_event(ctx, "updated", Value::Object(payload)).await;
        }
        Ok(serialized)
    }
}
