//! # Parameter Schemas
//!
//! A compiled subset of JSON Schema used to validate structured request parameters. Like a
//! validator configured with type coercion and defaults, [`Schema::validate`] mutates the
//! value it checks:
//!
//! - absent properties that declare a `default` receive a copy of it,
//! - scalars are converted toward the declared type when the conversion is unambiguous
//!   (`"true"` to `true`, `"10"` to `10`, `1` to `"1"`).
//!
//! Every failed constraint is collected; the error message lists them all.
//!
//! Supported keywords: `type` (single or list), `properties`, `required`,
//! `additionalProperties` (boolean or schema), `items`, `enum`, `default`, `minimum`,
//! `maximum`, `minLength`, `maxLength`. Other keywords are ignored.
//!
//! ```rust
//! use entity_service::schema::Schema;
//! use serde_json::json;
//!
//! let schema = Schema::compile(json!({
//!     "type": "object",
//!     "properties": {
//!         "query": {
//!             "type": "object",
//!             "properties": {
//!                 "page": { "type": "number", "default": 1 },
//!                 "drafts": { "type": "boolean" }
//!             }
//!         }
//!     }
//! })).unwrap();
//!
//! let mut params = json!({"query": {"drafts": "true"}});
//! schema.validate(&mut params).unwrap();
//! assert_eq!(params, json!({"query": {"drafts": true, "page": 1}}));
//! ```

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::fmt;

/// Errors raised when a schema descriptor itself is invalid.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Invalid schema at {path}: {reason}")]
    Invalid { path: String, reason: String },
    #[error("Unknown type {type_name:?} at {path}")]
    UnknownType { path: String, type_name: String },
}

/// One failed constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    /// JSON pointer of the offending value (empty for the root).
    #[serde(rename = "instancePath")]
    pub instance_path: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data{} {}", self.instance_path, self.message)
    }
}

/// Raised when a value does not satisfy a schema.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid params: {}", render_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

fn render_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "null" => Self::Null,
            "boolean" => Self::Boolean,
            "integer" => Self::Integer,
            "number" => Self::Number,
            "string" => Self::String,
            "array" => Self::Array,
            "object" => Self::Object,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (Self::Null, Value::Null)
            | (Self::Boolean, Value::Bool(_))
            | (Self::Number, Value::Number(_))
            | (Self::String, Value::String(_))
            | (Self::Array, Value::Array(_))
            | (Self::Object, Value::Object(_)) => true,
            (Self::Integer, Value::Number(n)) => is_integral(n),
            _ => false,
        }
    }

    /// Unambiguous scalar conversion toward `self`.
    fn coerce(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (Self::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (Self::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
            (Self::String, Value::Null) => Some(Value::String(String::new())),
            (Self::Number | Self::Integer, Value::String(s)) => {
                let number = parse_number(s)?;
                (self == Self::Number || is_integral(&number)).then_some(Value::Number(number))
            }
            (Self::Number | Self::Integer, Value::Bool(b)) => Some(Value::from(u8::from(*b))),
            (Self::Number | Self::Integer, Value::Null) => Some(Value::from(0)),
            (Self::Boolean, Value::String(s)) if s == "true" => Some(Value::Bool(true)),
            (Self::Boolean, Value::String(s)) if s == "false" => Some(Value::Bool(false)),
            (Self::Boolean, Value::Number(n)) => match n.as_f64() {
                Some(f) if f == 0.0 => Some(Value::Bool(false)),
                Some(f) if f == 1.0 => Some(Value::Bool(true)),
                _ => None,
            },
            (Self::Boolean, Value::Null) => Some(Value::Bool(false)),
            (Self::Null, Value::String(s)) if s.is_empty() => Some(Value::Null),
            (Self::Null, Value::Number(n)) if n.as_f64() == Some(0.0) => Some(Value::Null),
            (Self::Null, Value::Bool(false)) => Some(Value::Null),
            _ => None,
        }
    }
}

fn is_integral(n: &Number) -> bool {
    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
}

fn parse_number(s: &str) -> Option<Number> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Number::from(i));
    }
    let f = trimmed.parse::<f64>().ok().filter(|f| f.is_finite())?;
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        return Some(Number::from(f as i64));
    }
    Number::from_f64(f)
}

#[derive(Debug, Clone)]
enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<SchemaNode>),
}

#[derive(Debug, Clone, Default)]
struct SchemaNode {
    types: Vec<JsonType>,
    properties: IndexMap<String, SchemaNode>,
    required: Vec<String>,
    additional: Option<AdditionalProperties>,
    items: Option<Box<SchemaNode>>,
    enumeration: Option<Vec<Value>>,
    default: Option<Value>,
    minimum: Option<Number>,
    maximum: Option<Number>,
    min_length: Option<usize>,
    max_length: Option<usize>,
}

impl SchemaNode {
    fn compile(descriptor: &Value, path: &str) -> Result<Self, SchemaError> {
        let Value::Object(map) = descriptor else {
            return Err(invalid(path, "expected an object"));
        };
        let mut node = SchemaNode::default();

        match map.get("type") {
            None => {}
            Some(Value::String(name)) => node.types.push(parse_type(name, path)?),
            Some(Value::Array(names)) => {
                for name in names {
                    let name = name
                        .as_str()
                        .ok_or_else(|| invalid(path, "type list must hold strings"))?;
                    node.types.push(parse_type(name, path)?);
                }
            }
            Some(_) => return Err(invalid(path, "type must be a string or a list")),
        }

        if let Some(properties) = map.get("properties") {
            let Value::Object(properties) = properties else {
                return Err(invalid(path, "properties must be an object"));
            };
            for (key, sub) in properties {
                let sub_path = format!("{path}/properties/{key}");
                node.properties
                    .insert(key.clone(), SchemaNode::compile(sub, &sub_path)?);
            }
        }

        if let Some(required) = map.get("required") {
            let Value::Array(required) = required else {
                return Err(invalid(path, "required must be a list"));
            };
            for key in required {
                let key = key
                    .as_str()
                    .ok_or_else(|| invalid(path, "required must hold strings"))?;
                node.required.push(key.to_string());
            }
        }

        node.additional = match map.get("additionalProperties") {
            None => None,
            Some(Value::Bool(allowed)) => Some(AdditionalProperties::Allowed(*allowed)),
            Some(sub @ Value::Object(_)) => Some(AdditionalProperties::Schema(Box::new(
                SchemaNode::compile(sub, &format!("{path}/additionalProperties"))?,
            ))),
            Some(_) => return Err(invalid(path, "additionalProperties must be a boolean or schema")),
        };

        if let Some(items) = map.get("items") {
            node.items = Some(Box::new(SchemaNode::compile(items, &format!("{path}/items"))?));
        }

        if let Some(enumeration) = map.get("enum") {
            let Value::Array(values) = enumeration else {
                return Err(invalid(path, "enum must be a list"));
            };
            node.enumeration = Some(values.clone());
        }

        node.default = map.get("default").cloned();
        node.minimum = number_keyword(map, "minimum", path)?;
        node.maximum = number_keyword(map, "maximum", path)?;
        node.min_length = length_keyword(map, "minLength", path)?;
        node.max_length = length_keyword(map, "maxLength", path)?;
        Ok(node)
    }

    fn validate(&self, value: &mut Value, path: &str, issues: &mut Vec<ValidationIssue>) {
        if !self.types.is_empty() && !self.types.iter().any(|t| t.matches(value)) {
            match self.types.iter().find_map(|t| t.coerce(value)) {
                Some(coerced) => *value = coerced,
                None => {
                    let names: Vec<_> = self.types.iter().map(|t| t.name()).collect();
                    issues.push(issue(path, format!("must be {}", names.join(","))));
                    return;
                }
            }
        }

        if let Some(allowed) = &self.enumeration {
            if !allowed.contains(value) {
                issues.push(issue(path, "must be equal to one of the allowed values".into()));
            }
        }

        match value {
            Value::Number(n) => self.check_bounds(n, path, issues),
            Value::String(s) => self.check_length(s, path, issues),
            Value::Array(items) => {
                if let Some(item_schema) = &self.items {
                    for (index, item) in items.iter_mut().enumerate() {
                        item_schema.validate(item, &format!("{path}/{index}"), issues);
                    }
                }
            }
            Value::Object(map) => self.validate_object(map, path, issues),
            _ => {}
        }
    }

    fn validate_object(
        &self,
        map: &mut Map<String, Value>,
        path: &str,
        issues: &mut Vec<ValidationIssue>,
    ) {
        for (key, sub) in &self.properties {
            if let Some(default) = &sub.default {
                if !map.contains_key(key) {
                    map.insert(key.clone(), default.clone());
                }
            }
        }

        for key in &self.required {
            if !map.contains_key(key) {
                issues.push(issue(path, format!("must have required property '{key}'")));
            }
        }

        let mut rejected_additional = false;
        for (key, value) in map.iter_mut() {
            let child_path = format!("{path}/{key}");
            if let Some(sub) = self.properties.get(key) {
                sub.validate(value, &child_path, issues);
                continue;
            }
            match &self.additional {
                Some(AdditionalProperties::Allowed(false)) => rejected_additional = true,
                Some(AdditionalProperties::Schema(sub)) => sub.validate(value, &child_path, issues),
                _ => {}
            }
        }
        if rejected_additional {
            issues.push(issue(path, "must NOT have additional properties".into()));
        }
    }

    fn check_bounds(&self, n: &Number, path: &str, issues: &mut Vec<ValidationIssue>) {
        let Some(actual) = n.as_f64() else { return };
        if let Some(min) = &self.minimum {
            if min.as_f64().is_some_and(|min| actual < min) {
                issues.push(issue(path, format!("must be >= {min}")));
            }
        }
        if let Some(max) = &self.maximum {
            if max.as_f64().is_some_and(|max| actual > max) {
                issues.push(issue(path, format!("must be <= {max}")));
            }
        }
    }

    fn check_length(&self, s: &str, path: &str, issues: &mut Vec<ValidationIssue>) {
        let length = s.chars().count();
        if let Some(min) = self.min_length {
            if length < min {
                issues.push(issue(path, format!("must NOT have fewer than {min} characters")));
            }
        }
        if let Some(max) = self.max_length {
            if length > max {
                issues.push(issue(path, format!("must NOT have more than {max} characters")));
            }
        }
    }
}

fn parse_type(name: &str, path: &str) -> Result<JsonType, SchemaError> {
    JsonType::parse(name).ok_or_else(|| SchemaError::UnknownType {
        path: path.to_string(),
        type_name: name.to_string(),
    })
}

fn number_keyword(
    map: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<Number>, SchemaError> {
    match map.get(key) {
        None => Ok(None),
        Some(Value::Number(n)) => Ok(Some(n.clone())),
        Some(_) => Err(invalid(path, &format!("{key} must be a number"))),
    }
}

fn length_keyword(
    map: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<usize>, SchemaError> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| invalid(path, &format!("{key} must be a non-negative integer"))),
    }
}

fn invalid(path: &str, reason: &str) -> SchemaError {
    SchemaError::Invalid {
        path: if path.is_empty() { "#".into() } else { format!("#{path}") },
        reason: reason.to_string(),
    }
}

fn issue(path: &str, message: String) -> ValidationIssue {
    ValidationIssue {
        instance_path: path.to_string(),
        message,
    }
}

/// A compiled parameter schema.
#[derive(Debug, Clone)]
pub struct Schema {
    descriptor: Value,
    root: SchemaNode,
}

impl Schema {
    pub fn compile(descriptor: Value) -> Result<Self, SchemaError> {
        let root = SchemaNode::compile(&descriptor, "")?;
        Ok(Self { descriptor, root })
    }

    /// The descriptor this schema was compiled from.
    pub fn descriptor(&self) -> &Value {
        &self.descriptor
    }

    /// Validates `value` in place, applying defaults and coercions.
    pub fn validate(&self, value: &mut Value) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        self.root.validate(value, "", &mut issues);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Whether the top-level property `name` is declared.
    pub fn declares(&self, name: &str) -> bool {
        self.root.properties.contains_key(name)
    }

    /// Keys declared under `properties.<name>.properties`, in declaration order.
    pub fn property_keys(&self, name: &str) -> Vec<String> {
        self.root
            .properties
            .get(name)
            .map(|node| node.properties.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `properties.<name>` explicitly accepts undeclared keys.
    pub fn accepts_additional(&self, name: &str) -> bool {
        matches!(
            self.root.properties.get(name).and_then(|node| node.additional.as_ref()),
            Some(AdditionalProperties::Allowed(true) | AdditionalProperties::Schema(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter_schema() -> Schema {
        Schema::compile(json!({
            "type": "object",
            "properties": {
                "body": { "type": "object", "additionalProperties": true },
                "query": {
                    "type": "object",
                    "properties": {
                        "filter": { "type": "string" },
                        "stopPropagation": { "type": "boolean" }
                    },
                    "required": ["filter"]
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn coerces_scalars_toward_declared_types() {
        let schema = Schema::compile(json!({
            "type": "object",
            "properties": {
                "flag": { "type": "boolean" },
                "page": { "type": "number" },
                "limit": { "type": "integer" },
                "name": { "type": "string" }
            }
        }))
        .unwrap();

        let mut value = json!({"flag": "false", "page": "2", "limit": "10", "name": 5});
        schema.validate(&mut value).unwrap();
        assert_eq!(value, json!({"flag": false, "page": 2, "limit": 10, "name": "5"}));
    }

    #[test]
    fn reports_every_failed_constraint() {
        let schema = filter_schema();
        let mut value = json!({"query": {"stopPropagation": "maybe"}});

        let err = schema.validate(&mut value).unwrap_err();
        assert_eq!(err.issues.len(), 2);
        assert_eq!(
            err.to_string(),
            "Invalid params: data/query must have required property 'filter', \
             data/query/stopPropagation must be boolean"
        );
    }

    #[test]
    fn defaults_satisfy_required() {
        let schema = Schema::compile(json!({
            "type": "object",
            "properties": { "limit": { "type": "number", "default": 100 } },
            "required": ["limit"]
        }))
        .unwrap();
        let mut value = json!({});
        schema.validate(&mut value).unwrap();
        assert_eq!(value, json!({"limit": 100}));
    }

    #[test]
    fn rejects_additional_properties_when_closed() {
        let schema = Schema::compile(json!({
            "type": "object",
            "properties": { "a": { "type": "number" } },
            "additionalProperties": false
        }))
        .unwrap();
        let mut value = json!({"a": 1, "b": 2});
        let err = schema.validate(&mut value).unwrap_err();
        assert_eq!(err.issues[0].message, "must NOT have additional properties");
    }

    #[test]
    fn uncoercible_values_fail() {
        let schema = Schema::compile(json!({"type": "number", "minimum": 1})).unwrap();
        assert!(schema.validate(&mut json!("abc")).is_err());
        assert!(schema.validate(&mut json!("")).is_err());

        let mut zero = json!("0");
        let err = schema.validate(&mut zero).unwrap_err();
        assert_eq!(err.to_string(), "Invalid params: data must be >= 1");
    }

    #[test]
    fn introspects_bucket_keys() {
        let schema = filter_schema();
        assert_eq!(schema.property_keys("query"), vec!["filter", "stopPropagation"]);
        assert!(schema.property_keys("body").is_empty());
        assert!(schema.accepts_additional("body"));
        assert!(!schema.accepts_additional("query"));
    }

    #[test]
    fn invalid_descriptors_are_rejected() {
        assert!(matches!(
            Schema::compile(json!({"type": "text"})),
            Err(SchemaError::UnknownType { .. })
        ));
        assert!(Schema::compile(json!({"required": "filter"})).is_err());
    }
}
