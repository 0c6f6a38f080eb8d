//! Query filters for the in-memory repository.
//!
//! A filter is a document of `path -> condition`. Paths may be dotted (`_meta.status`). A
//! condition is either a plain value (equality) or an operator document using `$eq`, `$ne`
//! or `$in`. A missing field compares equal to `null`.

use super::RepositoryError;
use crate::ejson::{get_path, Bson, Document};

/// Filter that matches a single `_id`.
pub fn by_id(id: Bson) -> Document {
    let mut filter = Document::new();
    filter.insert("_id", id);
    filter
}

/// Whether `doc` satisfies every clause of `filter`.
pub fn matches(doc: &Document, filter: &Document) -> Result<bool, RepositoryError> {
    for (path, condition) in filter {
        let actual = get_path(doc, path).unwrap_or(&Bson::Null);
        if !clause_matches(actual, condition)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clause_matches(actual: &Bson, condition: &Bson) -> Result<bool, RepositoryError> {
    let Some(operators) = operator_document(condition) else {
        return Ok(actual == condition);
    };
    for (operator, operand) in operators {
        let satisfied = match operator.as_str() {
            "$eq" => actual == operand,
            "$ne" => actual != operand,
            "$in" => match operand {
                Bson::Array(candidates) => candidates.contains(actual),
                _ => {
                    return Err(RepositoryError::UnsupportedFilter(
                        "$in needs an array".into(),
                    ))
                }
            },
            other => return Err(RepositoryError::UnsupportedFilter(other.to_string())),
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn operator_document(condition: &Bson) -> Option<&Document> {
    condition
        .as_document()
        .filter(|doc| !doc.is_empty() && doc.keys().all(|key| key.starts_with('$')))
}

/// The plain-equality clauses of a filter, used to seed an upserted document.
pub fn equality_fields(filter: &Document) -> Document {
    filter
        .iter()
        .filter(|(path, condition)| !path.contains('.') && operator_document(condition).is_none())
        .map(|(path, condition)| (path.clone(), condition.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ejson::{from_json, BsonExt};
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        from_json(value).unwrap().into_document().unwrap()
    }

    #[test]
    fn equality_and_dotted_paths() {
        let stored = doc(json!({"name": "a", "_meta": {"status": "DRAFT"}}));
        assert!(matches(&stored, &doc(json!({"name": "a"}))).unwrap());
        assert!(matches(&stored, &doc(json!({"_meta.status": "DRAFT"}))).unwrap());
        assert!(!matches(&stored, &doc(json!({"name": "b"}))).unwrap());
        assert!(matches(&stored, &doc(json!({"missing": null}))).unwrap());
    }

    #[test]
    fn operators() {
        let stored = doc(json!({"_meta": {"status": "PUBLISHED"}}));
        let filter = doc(json!({"_meta.status": {"$in": ["PUBLISHED", "DRAFT"]}}));
        assert!(matches(&stored, &filter).unwrap());
        assert!(matches(&stored, &doc(json!({"_meta.status": {"$ne": "DRAFT"}}))).unwrap());
        assert!(matches!(
            matches(&stored, &doc(json!({"n": {"$gt": 1}}))),
            Err(RepositoryError::UnsupportedFilter(_))
        ));
    }

    #[test]
    fn upsert_seed_skips_operators() {
        let filter = doc(json!({"slug": "x", "n": {"$in": [1]}, "a.b": 1}));
        assert_eq!(equality_fields(&filter), doc(json!({"slug": "x"})));
    }
}
