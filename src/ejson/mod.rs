//! # Extended JSON
//!
//! The broker only carries plain JSON. Rich document types (object ids, dates, binary)
//! cross it as wrapper objects whose single key starts with `$`, such as
//! `{"$oid": "65a1f0c2e4b0a1b2c3d4e5f6"}`.
//!
//! The value model is the `bson` crate's, re-exported here. This module adds the boundary:
//!
//! - [`serialize`] / [`deserialize`]: relaxed extended JSON in and out.
//! - [`is_extended_document`]: the marker detector, run once per inbound payload by
//!   [`decode_if_extended`].
//! - [`get_path`] / [`set_path`]: dotted-path access used by the in-memory repository.
//!
//! ```rust
//! use entity_service::ejson::{self, Bson, ObjectId};
//! use serde_json::json;
//!
//! let id = ObjectId::parse_str("65a1f0c2e4b0a1b2c3d4e5f6").unwrap();
//! let wire = ejson::serialize(&Bson::ObjectId(id));
//! assert_eq!(wire, json!({"$oid": "65a1f0c2e4b0a1b2c3d4e5f6"}));
//! assert!(ejson::is_extended_document(&json!({"author": wire.clone()})));
//! assert_eq!(ejson::deserialize(wire).unwrap(), Bson::ObjectId(id));
//! ```

mod codec;
mod detect;
mod error;
mod value;

pub use bson::oid::ObjectId;
pub use bson::{Binary, Bson, DateTime, Document};
pub use codec::{decode_if_extended, deserialize, from_json, serialize};
pub use detect::{is_extended_document, MARKER_PREFIX};
pub use error::EjsonError;
pub use value::{get_path, set_path, BsonExt};
