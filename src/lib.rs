#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # Entity Service
//!
//! > **CRUD and lifecycle actions for document entities, hosted on a service broker.**
//!
//! This crate turns a document collection into a broker service with a fixed set of REST
//! aliased actions (list, get, insert, patch, replace, delete, publish, archive, unpublish).
//! Rich document types cross the JSON-only broker as extended JSON.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Two shapes per write
//! Every write path is split in two: a REST adapter that untangles the flattened parameter
//! bag, and a broker-only core action the adapter forwards to. Other services call the core
//! action directly and never deal with HTTP conventions.
//!
//! ### Refusals are values
//! A repository may refuse an operation by policy (listing drafts, an illegal status move).
//! Inside the call chain that is an [`Outcome::Prevented`](repository::Outcome) value; it
//! becomes an error only when a handler hands its result back to the broker.
//!
//! ### One owned connection
//! Repositories come from a [`Connection`](repository::Connection) that is opened once,
//! injected into every service and closed once at shutdown.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Wire ([`ejson`], [`call`])
//! The re-exported `bson` value model with the extended-JSON boundary and marker detector,
//! plus [`call_remote`] which keeps extended values intact across broker calls.
//!
//! ### 2. The Boundary ([`params`], [`schema`], [`id`])
//! Parameter unmerging, schema validation with coercion and defaults, and target-id
//! resolution.
//!
//! ### 3. The Service ([`service`], [`actions`], [`entity`], [`ejson_service`])
//! [`EntityService`] and its handlers, the [`Entity`] declaration trait, and the
//! [`EjsonService`] adapter for hand-written services.
//!
//! ### 4. The Store ([`repository`])
//! The [`Repository`](repository::Repository) trait and the in-memory actor implementation.
//!
//! ## 🚀 Quick Start
//!
//! ```rust,no_run
//! use entity_service::config::MixinOptions;
//! use entity_service::entity::{parse_object_id, Entity};
//! use entity_service::ejson::Bson;
//! use entity_service::repository::MemoryConnection;
//! use entity_service::{EntityService, ServiceError};
//! use service_broker::ServiceBroker;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct Article;
//!
//! impl Entity for Article {
//!     const COLLECTION: &'static str = "articles";
//!
//!     fn parse_id(id: Bson) -> Result<Bson, ServiceError> {
//!         parse_object_id(id)
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = MixinOptions::new("blog");
//! let connection = Arc::new(MemoryConnection::open(&options)?);
//!
//! let (mut broker, client) = ServiceBroker::new(64);
//! broker.register(EntityService::<Article>::new(options, connection.clone())?);
//! tokio::spawn(broker.run());
//!
//! let created = client
//!     .call("articles.insertOne", json!({"title": "Hello"}), Default::default())
//!     .await?;
//! println!("{created}");
//! # Ok(())
//! # }
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```

pub mod actions;
pub mod call;
pub mod config;
pub mod ejson;
pub mod ejson_service;
pub mod entity;
pub mod error;
pub mod id;
pub mod params;
pub mod repository;
pub mod schema;
pub mod service;

pub use call::call_remote;
pub use ejson_service::{EjsonActions, EjsonService};
pub use entity::Entity;
pub use error::ServiceError;
pub use id::resolve_id;
pub use service::{EntityService, EVENT_PREFIX_META};
