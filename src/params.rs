//! # Parameter Unmerging
//!
//! REST aliases flatten path variables, query-string fields and the request body into one
//! object before a call reaches the service. Handlers need them apart again:
//!
//! ```text
//! {"id": "a1", "stopPropagation": "true", "name": "b"}
//!     -> {"query": {"stopPropagation": "true"}, "body": {"name": "b"}}
//! ```
//!
//! A bag is either [`ParamBag::Flat`] or [`ParamBag::Structured`]. Structured bags have
//! already been split (by a transport that keeps the buckets apart, or by an earlier
//! unmerge) and pass through untouched, which makes [`unmerge`] idempotent.

use crate::schema::{Schema, ValidationError};
use serde_json::{Map, Value};
use service_broker::Context;

/// Keys that mark a bag as already structured.
pub const STRUCTURED_KEYS: [&str; 3] = ["params", "query", "body"];

/// The two admissible shapes of an inbound parameter bag.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamBag {
    /// Path, query and body fields mixed at the top level.
    Flat(Map<String, Value>),
    /// Only `params`, `query` and `body` keys, holding objects, at least one of them
    /// non-empty in the truthy sense.
    Structured(Map<String, Value>),
}

impl ParamBag {
    /// Classifies a raw bag. Non-object bags are treated as an empty flat bag.
    ///
    /// A document field that happens to be called `body` or `query` does not make a bag
    /// structured: any other key alongside it, or a non-object value under it, keeps the
    /// bag flat.
    pub fn classify(value: Value) -> Self {
        let map = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let only_buckets = map.iter().all(|(key, value)| {
            STRUCTURED_KEYS.contains(&key.as_str()) && matches!(value, Value::Object(_) | Value::Null)
        });
        let structured = only_buckets && map.values().any(truthy);
        if structured {
            ParamBag::Structured(map)
        } else {
            ParamBag::Flat(map)
        }
    }
}

/// Which flat keys route to which bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnmergeShape {
    pub query_keys: Vec<String>,
    pub body_keys: Vec<String>,
    /// Kept out of `body` when additional keys are merged (e.g. `id`).
    pub excluded_keys: Vec<String>,
    pub allow_additional_body_keys: bool,
}

impl UnmergeShape {
    /// Derives the shape from `properties.query` and `properties.body` of a schema.
    pub fn from_schema(schema: &Schema, excluded: &[&str]) -> Self {
        Self {
            query_keys: schema.property_keys("query"),
            body_keys: schema.property_keys("body"),
            excluded_keys: excluded.iter().map(|key| key.to_string()).collect(),
            allow_additional_body_keys: schema.accepts_additional("body"),
        }
    }
}

/// Structured request parameters: `params`, `query` and `body` buckets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams(Map<String, Value>);

impl RequestParams {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn params(&self) -> Option<&Map<String, Value>> {
        self.0.get("params").and_then(Value::as_object)
    }

    pub fn query(&self) -> Option<&Map<String, Value>> {
        self.0.get("query").and_then(Value::as_object)
    }

    pub fn body(&self) -> Option<&Value> {
        self.0.get("body")
    }

    /// A query field, if present.
    pub fn query_value(&self, key: &str) -> Option<&Value> {
        self.query().and_then(|query| query.get(key))
    }

    /// Whether a query field is set and truthy.
    pub fn query_flag(&self, key: &str) -> bool {
        self.query_value(key).is_some_and(truthy)
    }

    /// Removes and returns the body, or an empty object when there is none.
    pub fn take_body(&mut self) -> Value {
        self.0
            .remove("body")
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn into_bag(self) -> ParamBag {
        ParamBag::classify(self.into_value())
    }
}

/// Splits a flat bag into buckets. Structured bags are returned unchanged.
///
/// Declared keys that are absent from the bag are skipped; a missing required field is
/// reported by validation, not here.
pub fn unmerge(bag: ParamBag, shape: &UnmergeShape) -> RequestParams {
    let flat = match bag {
        ParamBag::Structured(map) => return RequestParams(map),
        ParamBag::Flat(map) => map,
    };

    let mut out = Map::new();
    if shape.query_keys.is_empty() && shape.body_keys.is_empty() && !shape.allow_additional_body_keys
    {
        out.insert("body".into(), Value::Object(flat));
        return RequestParams(out);
    }

    if !shape.query_keys.is_empty() {
        out.insert("query".into(), Value::Object(pick(&flat, &shape.query_keys)));
    }
    if !shape.body_keys.is_empty() {
        out.insert("body".into(), Value::Object(pick(&flat, &shape.body_keys)));
    }
    if shape.allow_additional_body_keys {
        let body = out
            .entry("body")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(body) = body {
            for (key, value) in &flat {
                let routed = shape.query_keys.contains(key)
                    || shape.body_keys.contains(key)
                    || shape.excluded_keys.contains(key);
                if !routed {
                    body.insert(key.clone(), value.clone());
                }
            }
        }
    }
    RequestParams(out)
}

fn pick(flat: &Map<String, Value>, keys: &[String]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|key| flat.get(key).map(|value| (key.clone(), value.clone())))
        .collect()
}

/// Unmerges the context's parameters with the shape derived from `schema`, then validates
/// (and coerces) the structured result.
pub fn unmerge_and_validate(
    ctx: &Context,
    schema: &Schema,
    excluded: &[&str],
) -> Result<RequestParams, ValidationError> {
    let shape = UnmergeShape::from_schema(schema, excluded);
    let mut value = unmerge(ParamBag::classify(ctx.params.clone()), &shape).into_value();
    schema.validate(&mut value)?;
    Ok(RequestParams::from_value(value))
}

/// Loose truthiness: `null`, `false`, `0`, `""` are false; everything else is true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch_shape() -> UnmergeShape {
        UnmergeShape {
            query_keys: vec!["stopPropagation".into()],
            body_keys: vec![],
            excluded_keys: vec!["id".into()],
            allow_additional_body_keys: true,
        }
    }

    #[test]
    fn splits_flat_bag_by_shape() {
        let bag = ParamBag::classify(json!({"id": "a1", "stopPropagation": "true", "name": "b"}));
        let params = unmerge(bag, &patch_shape());
        assert_eq!(
            params.into_value(),
            json!({"query": {"stopPropagation": "true"}, "body": {"name": "b"}})
        );
    }

    #[test]
    fn whole_bag_becomes_body_without_shape() {
        let bag = ParamBag::classify(json!({"name": "a"}));
        let params = unmerge(bag, &UnmergeShape::default());
        assert_eq!(params.into_value(), json!({"body": {"name": "a"}}));
    }

    #[test]
    fn absent_declared_keys_are_skipped() {
        let bag = ParamBag::classify(json!({"name": "a"}));
        let params = unmerge(bag, &patch_shape());
        assert_eq!(params.into_value(), json!({"query": {}, "body": {"name": "a"}}));
    }

    #[test]
    fn declared_body_keys_without_merging() {
        let shape = UnmergeShape {
            query_keys: vec![],
            body_keys: vec!["title".into()],
            excluded_keys: vec![],
            allow_additional_body_keys: false,
        };
        let params = unmerge(ParamBag::classify(json!({"title": "t", "extra": 1})), &shape);
        assert_eq!(params.into_value(), json!({"body": {"title": "t"}}));
    }

    #[test]
    fn unmerge_is_idempotent() {
        let shape = patch_shape();
        let bag = ParamBag::classify(json!({"id": "a1", "stopPropagation": true, "x": 1}));
        let once = unmerge(bag, &shape);
        let twice = unmerge(once.clone().into_bag(), &shape);
        assert_eq!(once, twice);
    }

    #[test]
    fn structured_bags_pass_through() {
        let raw = json!({"params": {"id": "a1"}, "body": {"name": "b"}});
        assert!(matches!(ParamBag::classify(raw.clone()), ParamBag::Structured(_)));
        let params = unmerge(ParamBag::classify(raw.clone()), &patch_shape());
        assert_eq!(params.into_value(), raw);
    }

    #[test]
    fn document_fields_named_like_buckets_stay_flat() {
        let bag = ParamBag::classify(json!({"title": "x", "body": "text"}));
        assert!(matches!(bag, ParamBag::Flat(_)));
        assert!(matches!(
            ParamBag::classify(json!({"body": "text"})),
            ParamBag::Flat(_)
        ));
        assert!(matches!(
            ParamBag::classify(json!({"query": {"drafts": true}, "name": "a"})),
            ParamBag::Flat(_)
        ));

        let shape = UnmergeShape {
            allow_additional_body_keys: true,
            ..UnmergeShape::default()
        };
        let once = unmerge(bag, &shape);
        assert_eq!(
            once.clone().into_value(),
            json!({"body": {"title": "x", "body": "text"}})
        );
        assert!(matches!(once.clone().into_bag(), ParamBag::Structured(_)));
        assert_eq!(unmerge(once.clone().into_bag(), &shape), once);
    }

    #[test]
    fn null_buckets_do_not_mark_structure() {
        assert!(matches!(
            ParamBag::classify(json!({"body": null, "name": "a"})),
            ParamBag::Flat(_)
        ));
    }

    #[test]
    fn truthiness() {
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!(null)));
        assert!(truthy(&json!("0")));
        assert!(truthy(&json!({})));
    }
}
