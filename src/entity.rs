//! Entity declarations.

use crate::ejson::{Bson, ObjectId};
use crate::error::ServiceError;

/// Static description of an entity type served by an [`EntityService`](crate::EntityService).
///
/// ```rust
/// use entity_service::entity::{parse_object_id, Entity};
/// use entity_service::ejson::Bson;
/// use entity_service::ServiceError;
///
/// struct Article;
///
/// impl Entity for Article {
///     const COLLECTION: &'static str = "articles";
///     const VERSION: Option<&'static str> = Some("1");
///
///     fn parse_id(id: Bson) -> Result<Bson, ServiceError> {
///         parse_object_id(id)
///     }
/// }
///
/// assert_eq!(Article::full_name(), "v1.articles");
/// ```
pub trait Entity: Send + Sync + 'static {
    /// Collection name, also used as the service name.
    const COLLECTION: &'static str;

    const VERSION: Option<&'static str> = None;

    /// Converts a resolved request id into the stored id type. Identity by default.
    fn parse_id(id: Bson) -> Result<Bson, ServiceError> {
        Ok(id)
    }

    fn full_name() -> String {
        service_broker::full_name(Self::COLLECTION, Self::VERSION)
    }
}

/// Accepts object ids and their 24-character hex form.
pub fn parse_object_id(id: Bson) -> Result<Bson, ServiceError> {
    match id {
        Bson::ObjectId(_) => Ok(id),
        Bson::String(s) => ObjectId::parse_str(&s)
            .map(Bson::ObjectId)
            .map_err(|_| ServiceError::InvalidId(s)),
        other => Err(ServiceError::InvalidId(other.to_string())),
    }
}

/// Accepts integers and their decimal string form.
pub fn parse_numeric_id(id: Bson) -> Result<Bson, ServiceError> {
    let n = match &id {
        Bson::Int32(_) | Bson::Int64(_) => return Ok(id),
        Bson::Double(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => *f as i64,
        Bson::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ServiceError::InvalidId(s.clone()))?,
        other => return Err(ServiceError::InvalidId(other.to_string())),
    };
    Ok(i32::try_from(n).map(Bson::Int32).unwrap_or(Bson::Int64(n)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_parser() {
        let id = parse_object_id(Bson::from("65a1f0c2e4b0a1b2c3d4e5f6")).unwrap();
        assert!(id.as_object_id().is_some());
        assert!(matches!(
            parse_object_id(Bson::from("abc")),
            Err(ServiceError::InvalidId(_))
        ));
    }

    #[test]
    fn numeric_parser() {
        assert_eq!(parse_numeric_id(Bson::from("42")).unwrap(), Bson::Int32(42));
        assert_eq!(
            parse_numeric_id(Bson::from("8589934592")).unwrap(),
            Bson::Int64(8_589_934_592)
        );
        assert_eq!(parse_numeric_id(Bson::Double(3.0)).unwrap(), Bson::Int32(3));
        assert!(parse_numeric_id(Bson::from("4x")).is_err());
    }
}
