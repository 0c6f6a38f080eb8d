use super::{
    decode_document, flag, forward_query_value, serialize_document, stop_propagation, EntityAction,
};
use crate::call::call_remote;
use crate::ejson::{self, Bson, BsonExt, Document};
use crate::entity::Entity;
use crate::error::ServiceError;
use crate::id::resolve_id;
use crate::params::unmerge_and_validate;
use crate::repository::filter::by_id;
use crate::repository::WriteOptions;
use crate::service::EntityService;
use serde_json::{Map, Value};
use service_broker::Context;

impl<E: Entity> EntityService<E> {
    /// `PATCH /:id`: forwards `{id, patch, stopPropagation}` to `patchOneById`.
    pub(crate) async fn patch_one_by_id_rest(&self, ctx: &mut Context) -> Result<Value, ServiceError> {
        let id = resolve_id::<E>(ctx)?;
        let mut params = unmerge_and_validate(ctx, &self.schemas().patch_one_by_id, &["id"])?;
        let patch = decode_document(params.take_body(), "patch")?;

        let mut forward = Document::new();
        forward.insert("id", id);
        forward.insert("patch", Bson::Document(patch));
        forward_query_value(&params, "stopPropagation", &mut forward)?;

        let (action, options) = Self::internal_call(ctx, EntityAction::PatchOneById);
        let result = call_remote(&*ctx, &action, &Bson::Document(forward), options).await?;
        Ok(ejson::serialize(&result))
    }

    pub(crate) async fn patch_one_by_id(&self, ctx: &mut Context) -> Result<Value, ServiceError> {
        let params = decode_document(ctx.params.clone(), "params")?;
        let id = match params.get("id") {
            Some(id) if !id.is_null() => E::parse_id(id.clone())?,
            _ => return Err(ServiceError::MissingId),
        };
        let patch = required_document(&params, "patch")?;

        let mut options = WriteOptions::with_snapshot();
        let result = self
            .repository()
            .await?
            .patch_one(by_id(id.clone()), patch.clone(), &mut options)
            .await?;
        let serialized = serialize_document(result.to_document());

        if !stop_propagation(&ctx.params) {
            let mut payload = Map::new();
            payload.insert("id".into(), ejson::serialize(&id));
            payload.insert("result".into(), serialized.clone());
            payload.insert("old".into(), serialize_document(options.snapshot.unwrap_or_default()));
            payload.insert("patch".into(), serialize_document(patch));
            self.emit_event(ctx, "updated", Value::Object(payload)).await;
        }
        Ok(serialized)
    }

    /// `PATCH /`: forwards `{filter, upsert, patch, stopPropagation}` to `patchOne`.
    ///
    /// The filter arrives as a JSON string in the query.
    pub(crate) async fn patch_one_rest(&self, ctx: &mut Context) -> Result<Value, ServiceError> {
        let mut params = unmerge_and_validate(ctx, &self.schemas().patch_one, &["id"])?;
        let filter = parse_filter(params.query_value("filter"))?;
        let patch = decode_document(params.take_body(), "patch")?;

        let mut forward = Document::new();
        forward.insert("filter", Bson::Document(filter));
        forward_query_value(&params, "upsert", &mut forward)?;
        forward.insert("patch", Bson::Document(patch));
        forward_query_value(&params, "stopPropagation", &mut forward)?;

        let (action, options) = Self::internal_call(ctx, EntityAction::PatchOne);
        let result = call_remote(&*ctx, &action, &Bson::Document(forward), options).await?;
        Ok(ejson::serialize(&result))
    }

    pub(crate) async fn patch_one(&self, ctx: &mut Context) -> Result<Value, ServiceError> {
        let params = decode_document(ctx.params.clone(), "params")?;
        let filter = match params.get("filter") {
            Some(Bson::Document(filter)) => filter.clone(),
            _ => return Err(ServiceError::InvalidFilter("filter must be an object".into())),
        };
        let patch = required_document(&params, "patch")?;

        let mut options = if flag(&ctx.params, "upsert") {
            WriteOptions::with_snapshot().upsert()
        } else {
            WriteOptions::with_snapshot()
        };
        let result = self
            .repository()
            .await?
            .patch_one(filter, patch.clone(), &mut options)
            .await?;
        let serialized = serialize_document(result.to_document());

        if !stop_propagation(&ctx.params) {
            let mut payload = Map::new();
            if let Some(id) = params.get("id").filter(|id| !id.is_null()) {
                payload.insert("id".into(), ejson::serialize(id));
            }
            payload.insert("result".into(), serialized.clone());
            payload.insert("old".into(), serialize_document(options.snapshot.unwrap_or_default()));
            payload.insert("patch".into(), serialize_document(patch));
            self.emit_event(ctx, "updated", Value::Object(payload)).await;
        }
        Ok(serialized)
    }
}

pub(crate) fn required_document(params: &Document, key: &str) -> Result<Document, ServiceError> {
    match params.get(key) {
        Some(Bson::Document(doc)) => Ok(doc.clone()),
        _ => Err(ServiceError::InvalidDocument(format!("{key} must be an object"))),
    }
}

/// Parses the JSON-encoded filter of `patchOneRest`, decoding extended values.
pub(crate) fn parse_filter(raw: Option<&Value>) -> Result<Document, ServiceError> {
    let text = match raw {
        Some(Value::String(text)) => text,
        Some(_) => return Err(ServiceError::InvalidFilter("filter must be a string".into())),
        None => return Err(ServiceError::InvalidFilter("filter is required".into())),
    };
    let value: Value = serde_json::from_str(text)
        .map_err(|err| ServiceError::InvalidFilter(err.to_string()))?;
    ejson::decode_if_extended(value)?
        .into_document()
        .ok_or_else(|| ServiceError::InvalidFilter("filter must be an object".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ejson::ObjectId;
    use serde_json::json;

    #[test]
    fn filters_are_decoded() {
        let filter = parse_filter(Some(&json!(
            r#"{"author": {"$oid": "65a1f0c2e4b0a1b2c3d4e5f6"}, "tags": {"$in": ["a"]}}"#
        )))
        .unwrap();
        assert_eq!(
            filter.get("author"),
            Some(&Bson::ObjectId(ObjectId::parse_str("65a1f0c2e4b0a1b2c3d4e5f6").unwrap()))
        );
        assert!(filter.get("tags").and_then(Bson::as_document).is_some());
    }

    #[test]
    fn bad_filters_are_rejected() {
        for raw in [json!("{not json"), json!("[1, 2]"), json!(7)] {
            assert!(matches!(
                parse_filter(Some(&raw)),
                Err(ServiceError::InvalidFilter(_))
            ));
        }
        assert!(matches!(parse_filter(None), Err(ServiceError::InvalidFilter(_))));
    }
}
