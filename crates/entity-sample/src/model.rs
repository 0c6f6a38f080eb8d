//! The blog's entities and their request payloads.

use entity_service::ejson::Bson;
use entity_service::entity::{parse_numeric_id, parse_object_id, Entity};
use entity_service::ServiceError;
use serde::{Deserialize, Serialize};

/// Articles are keyed by object id and served as `v1.articles`.
pub struct Article;

impl Entity for Article {
    const COLLECTION: &'static str = "articles";
    const VERSION: Option<&'static str> = Some("1");

    fn parse_id(id: Bson) -> Result<Bson, ServiceError> {
        parse_object_id(id)
    }
}

/// Authors are keyed by integers supplied by the caller.
pub struct Author;

impl Entity for Author {
    const COLLECTION: &'static str = "authors";

    fn parse_id(id: Bson) -> Result<Bson, ServiceError> {
        parse_numeric_id(id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorCreate {
    #[serde(rename = "_id")]
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleCreate {
    pub title: String,
    pub body: String,
    /// Author id.
    pub author: i64,
}
