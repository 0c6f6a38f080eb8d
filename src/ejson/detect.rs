use serde_json::Value;

/// Keys starting with this character mark extended-JSON content.
pub const MARKER_PREFIX: char = '$';

/// Returns `true` when any key at any depth starts with [`MARKER_PREFIX`].
///
/// Scalars and `null` are never extended. Arrays are walked like objects, so an array of
/// wrapped ids is detected too.
pub fn is_extended_document(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .any(|(key, inner)| key.starts_with(MARKER_PREFIX) || is_extended_document(inner)),
        Value::Array(items) => items.iter().any(is_extended_document),
        _ => false,
    }
}
