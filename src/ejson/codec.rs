//! Relaxed extended-JSON encoding.
//!
//! Encoding is `bson`'s relaxed form: int32, int64 and finite doubles are plain numbers,
//! object ids are `{"$oid": ..}`, datetimes in 1970..=9999 are `{"$date": "<RFC 3339>"}`
//! and binary is `{"$binary": {"base64": .., "subType": ..}}`. Decoding also accepts the
//! canonical and legacy forms. Objects whose `$` keys match no wrapper (query operators,
//! `{"$ref": .., "_id": ..}`) decode as plain documents.
//!
//! JSON integers above `i64::MAX` are rejected rather than narrowed to a double.

use super::{is_extended_document, Bson, Document, EjsonError};
use serde_json::{Number, Value};

/// Encodes a value as relaxed extended JSON.
pub fn serialize(value: &Bson) -> Value {
    value.clone().into_relaxed_extjson()
}

/// Decodes relaxed or canonical extended JSON.
pub fn deserialize(value: Value) -> Result<Bson, EjsonError> {
    check_integers(&value)?;
    Bson::try_from(value).map_err(|err| EjsonError::Malformed(err.to_string()))
}

/// Converts plain JSON without interpreting any wrapper.
pub fn from_json(value: Value) -> Result<Bson, EjsonError> {
    Ok(match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(b),
        Value::Number(n) => from_number(&n)?,
        Value::String(s) => Bson::String(s),
        Value::Array(items) => Bson::Array(
            items
                .into_iter()
                .map(from_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Object(map) => {
            let mut doc = Document::new();
            for (key, value) in map {
                doc.insert(key, from_json(value)?);
            }
            Bson::Document(doc)
        }
    })
}

/// Decodes `value` only when it carries extended markers; otherwise converts it as plain JSON.
pub fn decode_if_extended(value: Value) -> Result<Bson, EjsonError> {
    if is_extended_document(&value) {
        deserialize(value)
    } else {
        from_json(value)
    }
}

fn from_number(n: &Number) -> Result<Bson, EjsonError> {
    if let Some(i) = n.as_i64() {
        return Ok(match i32::try_from(i) {
            Ok(small) => Bson::Int32(small),
            Err(_) => Bson::Int64(i),
        });
    }
    if n.is_u64() {
        return Err(EjsonError::IntegerOutOfRange(n.to_string()));
    }
    n.as_f64()
        .map(Bson::Double)
        .ok_or_else(|| EjsonError::Malformed(format!("unrepresentable number {n}")))
}

fn check_integers(value: &Value) -> Result<(), EjsonError> {
    match value {
        Value::Number(n) if n.is_u64() && n.as_i64().is_none() => {
            Err(EjsonError::IntegerOutOfRange(n.to_string()))
        }
        Value::Array(items) => items.iter().try_for_each(check_integers),
        Value::Object(map) => map.values().try_for_each(check_integers),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ejson::{Binary, DateTime, ObjectId};
    use bson::spec::BinarySubtype;
    use serde_json::json;

    fn sample() -> Bson {
        let mut meta = Document::new();
        meta.insert("status", "DRAFT");
        meta.insert("created", DateTime::from_millis(1_700_000_000_123));

        let mut doc = Document::new();
        doc.insert(
            "_id",
            ObjectId::parse_str("65a1f0c2e4b0a1b2c3d4e5f6").unwrap(),
        );
        doc.insert("count", 3);
        doc.insert("ratio", 0.5);
        doc.insert(
            "blob",
            Binary {
                subtype: BinarySubtype::Generic,
                bytes: vec![1, 2, 3],
            },
        );
        doc.insert("ancient", DateTime::from_millis(-86_400_000));
        doc.insert("tags", vec![Bson::from("a"), Bson::Null]);
        doc.insert("_meta", meta);
        Bson::Document(doc)
    }

    #[test]
    fn relaxed_wire_shapes() {
        let value = serialize(&sample());
        assert_eq!(value["_id"], json!({"$oid": "65a1f0c2e4b0a1b2c3d4e5f6"}));
        assert_eq!(value["count"], json!(3));
        assert_eq!(value["blob"], json!({"$binary": {"base64": "AQID", "subType": "00"}}));
        assert_eq!(value["_meta"]["created"], json!({"$date": "2023-11-14T22:13:20.123Z"}));
        assert_eq!(value["ancient"], json!({"$date": {"$numberLong": "-86400000"}}));
    }

    #[test]
    fn round_trip_preserves_every_type() {
        let original = sample();
        assert_eq!(deserialize(serialize(&original)).unwrap(), original);
    }

    #[test]
    fn key_order_survives_the_wire() {
        let mut doc = Document::new();
        doc.insert("zeta", 1);
        doc.insert("alpha", 2);
        let wire = serialize(&Bson::Document(doc));
        let keys: Vec<&str> = wire.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["zeta", "alpha"]);

        let decoded = deserialize(wire).unwrap();
        let keys: Vec<&str> = decoded.as_document().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["zeta", "alpha"]);
    }

    #[test]
    fn unknown_dollar_keys_stay_documents() {
        let decoded = deserialize(json!({"_meta.status": {"$in": ["PUBLISHED"]}})).unwrap();
        let clause = decoded
            .as_document()
            .and_then(|filter| filter.get_document("_meta.status").ok())
            .unwrap();
        assert_eq!(clause.get("$in"), Some(&Bson::Array(vec![Bson::from("PUBLISHED")])));

        let reference = deserialize(json!({"$ref": "x", "_id": "y"})).unwrap();
        assert_eq!(reference.as_document().unwrap().len(), 2);
    }

    #[test]
    fn malformed_wrappers_fail() {
        assert!(matches!(
            deserialize(json!({"$oid": "not-hex"})),
            Err(EjsonError::Malformed(_))
        ));
        assert!(deserialize(json!({"$date": "yesterday"})).is_err());
    }

    #[test]
    fn integers_beyond_i64_are_rejected() {
        let huge = json!({"n": 18446744073709551615u64});
        assert_eq!(
            decode_if_extended(huge.clone()),
            Err(EjsonError::IntegerOutOfRange("18446744073709551615".into()))
        );
        assert!(matches!(
            deserialize(json!({"$oid": "65a1f0c2e4b0a1b2c3d4e5f6", "n": [18446744073709551615u64]})),
            Err(EjsonError::IntegerOutOfRange(_))
        ));
        assert_eq!(from_json(json!(9_223_372_036_854_775_807i64)), Ok(Bson::Int64(i64::MAX)));
    }

    #[test]
    fn plain_values_are_not_interpreted() {
        let plain = decode_if_extended(json!({"name": "a", "n": 1})).unwrap();
        let doc = plain.as_document().unwrap();
        assert_eq!(doc.get("name"), Some(&Bson::from("a")));
        assert_eq!(doc.get("n"), Some(&Bson::Int32(1)));
    }
}
