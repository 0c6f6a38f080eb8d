//! # Service Broker
//!
//! This crate provides an in-process service broker: named services expose action tables,
//! callers invoke `<service>.<action>` with a JSON parameter bag and receive a JSON result or a
//! structured [`ActionError`]. Services also broadcast named events to pattern subscriptions.
//!
//! ## Architecture Overview
//!
//! The broker follows the actor pattern:
//!
//! 1. **Service Layer** ([`Service`]) - Your handlers and their action tables
//! 2. **Runtime Layer** ([`ServiceBroker`]) - Routing, event fan-out and lifecycle hooks
//! 3. **Interface Layer** ([`BrokerClient`], [`Context`]) - Type-safe communication
//!
//! The broker loop owns the registry and the subscriptions, so neither needs a lock. Each
//! call runs on its own Tokio task with a fresh [`Context`]. A handler can therefore call
//! other actions (or actions of its own service) while the loop keeps routing.
//!
//! ```rust
//! use async_trait::async_trait;
//! use serde_json::{json, Value};
//! use service_broker::{ActionDef, ActionError, CallOptions, Context, Service, ServiceBroker};
//!
//! struct Counter;
//!
//! #[async_trait]
//! impl Service for Counter {
//!     fn name(&self) -> &str { "counter" }
//!     fn version(&self) -> Option<&str> { Some("1") }
//!     fn actions(&self) -> Vec<ActionDef> {
//!         vec![ActionDef::rest("double", "POST /double"), ActionDef::internal("twice")]
//!     }
//!     async fn handle(&self, ctx: &mut Context) -> Result<Value, ActionError> {
//!         let n = ctx.params["n"].as_i64().unwrap_or(0);
//!         match ctx.action_name() {
//!             "twice" => Ok(json!(n * 2)),
//!             // Delegation to an internal action of the same service.
//!             _ => Ok(ctx.call("v1.counter.twice", json!({"n": n}), CallOptions::new()).await?),
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let (mut broker, client) = ServiceBroker::new(16);
//!     broker.register(Counter);
//!     let handle = tokio::spawn(broker.run());
//!
//!     let n = client.call("v1.counter.double", json!({"n": 21}), CallOptions::new()).await.unwrap();
//!     assert_eq!(n, json!(42));
//!
//!     drop(client);
//!     handle.await.unwrap();
//! }
//! ```
//!
//! ## Metadata
//!
//! Metadata travels with a call in [`CallOptions::meta`] and is **not** inherited by nested
//! calls. Handlers can write into [`Context::meta`] (for example the `$statusCode` override,
//! see [`STATUS_CODE_META`]); [`BrokerClient::call_with_meta`] returns the final map.
//!
//! ## Testing
//!
//! [`mock::MockBroker`] answers calls from a scripted queue and records every call and
//! event, so a handler that delegates to other services can be unit tested in isolation.

pub mod broker;
pub mod client;
pub mod context;
pub mod error;
pub mod event;
pub mod message;
pub mod mock;
pub mod service;
pub mod tracing;

// Re-export core types for convenience
pub use broker::ServiceBroker;
pub use client::BrokerClient;
pub use context::{Caller, Context, STATUS_CODE_META};
pub use error::{ActionError, BrokerError};
pub use event::{pattern_matches, EventStream};
pub use message::{ActionResponse, BrokerRequest, CallOptions, Event, Meta, Response};
pub use service::{full_name, ActionDef, Service, ServiceInfo, Visibility};
