//! # Identifier Resolution
//!
//! The target id of a request is read from `id`, falling back to `params.id` for
//! structured bags. Resolution then runs in a fixed order:
//!
//! 1. an object carrying extended markers is decoded,
//! 2. otherwise an object with a truthy `_id` yields that `_id`,
//! 3. otherwise the value is taken as text and percent-decoded,
//! 4. finally the entity's [`Entity::parse_id`] hook converts the result.
//!
//! Decoding comes before the `_id` shortcut, so `{"$ref": "x", "_id": "y"}` resolves to
//! the decoded reference document rather than to `"y"`.

use crate::ejson::{self, Bson};
use crate::entity::Entity;
use crate::error::ServiceError;
use crate::params::truthy;
use serde_json::Value;
use service_broker::Context;

/// Resolves the request's target id for entity `E`.
pub fn resolve_id<E: Entity>(ctx: &Context) -> Result<Bson, ServiceError> {
    E::parse_id(extract_id(&ctx.params)?)
}

/// Steps 1 to 3 of the resolution, without the entity hook.
pub fn extract_id(params: &Value) -> Result<Bson, ServiceError> {
    let raw = params
        .get("id")
        .filter(|id| truthy(id))
        .or_else(|| {
            params
                .get("params")
                .and_then(|nested| nested.get("id"))
                .filter(|id| truthy(id))
        })
        .ok_or(ServiceError::MissingId)?;

    if matches!(raw, Value::Object(_) | Value::Array(_)) && ejson::is_extended_document(raw) {
        return Ok(ejson::deserialize(raw.clone())?);
    }
    if let Some(inner) = raw.get("_id").filter(|inner| truthy(inner)) {
        return Ok(ejson::from_json(inner.clone())?);
    }

    let text = match raw {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => return Err(ServiceError::InvalidId(other.to_string())),
    };
    urlencoding::decode(&text)
        .map(|decoded| Bson::String(decoded.into_owned()))
        .map_err(|_| ServiceError::InvalidId(text.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ejson::{Document, ObjectId};
    use crate::entity::parse_numeric_id;
    use serde_json::json;

    #[test]
    fn flat_and_nested_ids() {
        assert_eq!(extract_id(&json!({"id": "a1"})).unwrap(), Bson::from("a1"));
        assert_eq!(
            extract_id(&json!({"params": {"id": "a2"}})).unwrap(),
            Bson::from("a2")
        );
    }

    #[test]
    fn missing_or_falsy_ids_fail() {
        for params in [json!({}), json!({"id": ""}), json!({"id": 0}), json!(null)] {
            assert_eq!(extract_id(&params), Err(ServiceError::MissingId));
        }
    }

    #[test]
    fn percent_encoded_ids_are_decoded() {
        assert_eq!(
            extract_id(&json!({"id": "caf%C3%A9%20au%20lait"})).unwrap(),
            Bson::from("café au lait")
        );
        assert_eq!(extract_id(&json!({"id": 42})).unwrap(), Bson::from("42"));
    }

    #[test]
    fn extended_ids_are_decoded() {
        let id = extract_id(&json!({"id": {"$oid": "65a1f0c2e4b0a1b2c3d4e5f6"}})).unwrap();
        assert_eq!(
            id,
            Bson::ObjectId(ObjectId::parse_str("65a1f0c2e4b0a1b2c3d4e5f6").unwrap())
        );
    }

    #[test]
    fn entity_references_use_their_id() {
        let id = extract_id(&json!({"id": {"_id": "a1", "name": "x"}})).unwrap();
        assert_eq!(id, Bson::from("a1"));
    }

    #[test]
    fn decode_wins_over_id_shortcut() {
        let id = extract_id(&json!({"id": {"$ref": "x", "_id": "y"}})).unwrap();
        let mut expected = Document::new();
        expected.insert("$ref", "x");
        expected.insert("_id", "y");
        assert_eq!(id, Bson::Document(expected));
    }

    #[test]
    fn objects_without_id_are_rejected() {
        assert!(matches!(
            extract_id(&json!({"id": {"name": "x"}})),
            Err(ServiceError::InvalidId(_))
        ));
    }

    #[test]
    fn entity_hook_runs_last() {
        struct Counter;
        impl Entity for Counter {
            const COLLECTION: &'static str = "counters";
            fn parse_id(id: Bson) -> Result<Bson, ServiceError> {
                parse_numeric_id(id)
            }
        }
        let parsed = Counter::parse_id(extract_id(&json!({"id": "7"})).unwrap()).unwrap();
        assert_eq!(parsed, Bson::Int32(7));
    }
}
