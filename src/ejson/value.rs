//! Helpers over the `bson` value model.

use super::{Bson, Document};

/// Accessors the handlers need that `Bson` does not provide directly.
pub trait BsonExt {
    fn is_null(&self) -> bool;

    /// Int32 and Int64 both widen to `i64`.
    fn as_integer(&self) -> Option<i64>;

    fn into_document(self) -> Option<Document>;
}

impl BsonExt for Bson {
    fn is_null(&self) -> bool {
        matches!(self, Bson::Null)
    }

    fn as_integer(&self) -> Option<i64> {
        match self {
            Bson::Int32(n) => Some(i64::from(*n)),
            Bson::Int64(n) => Some(*n),
            _ => None,
        }
    }

    fn into_document(self) -> Option<Document> {
        match self {
            Bson::Document(doc) => Some(doc),
            _ => None,
        }
    }
}

/// Reads a dotted path (`_meta.status`) out of a document.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Writes a dotted path, creating intermediate documents as needed. Non-document
/// intermediates are replaced.
pub fn set_path(doc: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(doc.get(head), Some(Bson::Document(_))) {
                doc.insert(head, Document::new());
            }
            if let Some(Bson::Document(inner)) = doc.get_mut(head) {
                set_path(inner, rest, value);
            }
        }
    }
}
