//! Action handlers of [`EntityService`](crate::EntityService).
//!
//! Each submodule adds handlers to the service through an `impl` block. Write paths come in
//! pairs: a REST-shaped adapter that unmerges and validates the flat parameter bag, and a
//! broker-only core action it forwards to, which other services may call directly.
//!
//! | Action | Route | Core action |
//! |--------|-------|-------------|
//! | `list` | `GET /` | |
//! | `listDrafts` | `GET /drafts` | |
//! | `listArchive` | `GET /archive` | |
//! | `getById` | `GET /:id` | |
//! | `insertOne` | `POST /` | |
//! | `patchOneByIdRest` | `PATCH /:id` | `patchOneById` |
//! | `patchOneRest` | `PATCH /` | `patchOne` |
//! | `replaceOneRest` | `PUT /` | `replaceOne` |
//! | `deleteOne` | `DELETE /:id` | |
//! | `publish` | `PUT /:id/publish` | |
//! | `archive` | `PUT /:id/archive` | |
//! | `unpublish` | `PUT /:id/unpublish` | |

mod create;
mod delete;
mod get;
mod lifecycle;
mod list;
mod patch;
mod replace;

pub use lifecycle::Lifecycle;

use crate::ejson::{self, Bson, BsonExt, Document};
use crate::error::ServiceError;
use crate::params::RequestParams;
use crate::schema::Schema;
use serde_json::{json, Value};
use service_broker::ActionDef;

/// The actions every entity service exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityAction {
    List,
    ListDrafts,
    ListArchive,
    GetById,
    InsertOne,
    PatchOneByIdRest,
    PatchOneById,
    PatchOneRest,
    PatchOne,
    ReplaceOneRest,
    ReplaceOne,
    DeleteOne,
    Publish,
    Archive,
    Unpublish,
}

impl EntityAction {
    pub const ALL: [EntityAction; 15] = [
        EntityAction::List,
        EntityAction::ListDrafts,
        EntityAction::ListArchive,
        EntityAction::GetById,
        EntityAction::InsertOne,
        EntityAction::PatchOneByIdRest,
        EntityAction::PatchOneById,
        EntityAction::PatchOneRest,
        EntityAction::PatchOne,
        EntityAction::ReplaceOneRest,
        EntityAction::ReplaceOne,
        EntityAction::DeleteOne,
        EntityAction::Publish,
        EntityAction::Archive,
        EntityAction::Unpublish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityAction::List => "list",
            EntityAction::ListDrafts => "listDrafts",
            EntityAction::ListArchive => "listArchive",
            EntityAction::GetById => "getById",
            EntityAction::InsertOne => "insertOne",
            EntityAction::PatchOneByIdRest => "patchOneByIdRest",
            EntityAction::PatchOneById => "patchOneById",
            EntityAction::PatchOneRest => "patchOneRest",
            EntityAction::PatchOne => "patchOne",
            EntityAction::ReplaceOneRest => "replaceOneRest",
            EntityAction::ReplaceOne => "replaceOne",
            EntityAction::DeleteOne => "deleteOne",
            EntityAction::Publish => "publish",
            EntityAction::Archive => "archive",
            EntityAction::Unpublish => "unpublish",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == name)
    }

    /// REST alias, or `None` for broker-only actions.
    pub fn route(&self) -> Option<&'static str> {
        Some(match self {
            EntityAction::List => "GET /",
            EntityAction::ListDrafts => "GET /drafts",
            EntityAction::ListArchive => "GET /archive",
            EntityAction::GetById => "GET /:id",
            EntityAction::InsertOne => "POST /",
            EntityAction::PatchOneByIdRest => "PATCH /:id",
            EntityAction::PatchOneRest => "PATCH /",
            EntityAction::ReplaceOneRest => "PUT /",
            EntityAction::DeleteOne => "DELETE /:id",
            EntityAction::Publish => "PUT /:id/publish",
            EntityAction::Archive => "PUT /:id/archive",
            EntityAction::Unpublish => "PUT /:id/unpublish",
            EntityAction::PatchOneById | EntityAction::PatchOne | EntityAction::ReplaceOne => {
                return None
            }
        })
    }

    pub fn definition(&self) -> ActionDef {
        match self.route() {
            Some(route) => ActionDef::rest(self.as_str(), route),
            None => ActionDef::internal(self.as_str()),
        }
    }
}

/// Parameter schemas of the REST adapters, compiled once per service.
#[derive(Debug, Clone)]
pub struct ActionSchemas {
    pub list: Schema,
    pub insert_one: Schema,
    pub patch_one_by_id: Schema,
    pub patch_one: Schema,
    pub replace_one: Schema,
}

impl ActionSchemas {
    pub fn compile() -> Result<Self, ServiceError> {
        Ok(Self {
            list: Schema::compile(json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "object",
                        "properties": {
                            "drafts": { "type": "boolean" },
                            "archived": { "type": "boolean" },
                            "page": { "type": "number" },
                            "limit": { "type": "number" }
                        }
                    }
                }
            }))?,
            insert_one: Schema::compile(open_body_schema(json!({
                "stopPropagation": { "type": "boolean" }
            }), &[]))?,
            patch_one_by_id: Schema::compile(open_body_schema(json!({
                "stopPropagation": { "type": "boolean" }
            }), &[]))?,
            patch_one: Schema::compile(open_body_schema(json!({
                "filter": { "type": "string" },
                "upsert": { "type": "boolean" },
                "stopPropagation": { "type": "boolean" }
            }), &["filter"]))?,
            replace_one: Schema::compile(open_body_schema(json!({
                "upsert": { "type": "boolean" },
                "stopPropagation": { "type": "boolean" }
            }), &[]))?,
        })
    }
}

/// A schema with an arbitrary object body and the given query properties.
fn open_body_schema(query_properties: Value, required: &[&str]) -> Value {
    let mut query = json!({ "type": "object", "properties": query_properties });
    if !required.is_empty() {
        query["required"] = json!(required);
    }
    json!({
        "type": "object",
        "properties": {
            "body": { "type": "object", "additionalProperties": true },
            "query": query
        }
    })
}

/// Reads a boolean flag from a flat bag or from its `query` bucket.
///
/// Accepts booleans and their common string and numeric spellings.
pub(crate) fn flag(params: &Value, key: &str) -> bool {
    let raw = params
        .get(key)
        .or_else(|| params.get("query").and_then(|q| q.get(key)));
    match raw {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.as_str(), "true" | "1"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

pub(crate) fn stop_propagation(params: &Value) -> bool {
    flag(params, "stopPropagation")
}

/// Copies `key` from the query bucket into a forwarded document when it was sent.
pub(crate) fn forward_query_value(
    params: &RequestParams,
    key: &str,
    target: &mut Document,
) -> Result<(), ServiceError> {
    if let Some(value) = params.query_value(key).filter(|v| !v.is_null()) {
        target.insert(key, ejson::from_json(value.clone())?);
    }
    Ok(())
}

/// Decodes a request value and requires it to be a document.
pub(crate) fn decode_document(value: Value, what: &str) -> Result<Document, ServiceError> {
    ejson::decode_if_extended(value)?
        .into_document()
        .ok_or_else(|| ServiceError::InvalidDocument(format!("{what} must be an object")))
}

pub(crate) fn serialize_document(doc: Document) -> Value {
    ejson::serialize(&Bson::Document(doc))
}

pub(crate) fn serialize_documents(docs: Vec<Document>) -> Value {
    Value::Array(docs.into_iter().map(serialize_document).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_round_trip() {
        for action in EntityAction::ALL {
            assert_eq!(EntityAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(EntityAction::parse("dropCollection"), None);
    }

    #[test]
    fn core_actions_have_no_route() {
        let internal: Vec<_> = EntityAction::ALL
            .into_iter()
            .filter(|action| action.route().is_none())
            .map(|action| action.as_str())
            .collect();
        assert_eq!(internal, ["patchOneById", "patchOne", "replaceOne"]);
    }

    #[test]
    fn schemas_compile() {
        let schemas = ActionSchemas::compile().unwrap();
        let mut query_keys = schemas.patch_one.property_keys("query");
        query_keys.sort();
        assert_eq!(query_keys, ["filter", "stopPropagation", "upsert"]);
        assert!(schemas.insert_one.accepts_additional("body"));
        assert!(!schemas.list.accepts_additional("query"));
    }

    #[test]
    fn stop_propagation_spellings() {
        assert!(stop_propagation(&json!({"stopPropagation": true})));
        assert!(stop_propagation(&json!({"stopPropagation": "true"})));
        assert!(stop_propagation(&json!({"query": {"stopPropagation": "1"}})));
        assert!(!stop_propagation(&json!({"stopPropagation": "false"})));
        assert!(!stop_propagation(&json!({})));
        assert!(flag(&json!({"upsert": 1}), "upsert"));
    }
}
