//! # Blog Sample
//!
//! Wires two entity services and one extended-JSON service onto a broker.
//!
//! - **[model]**: the [`Article`](model::Article) and [`Author`](model::Author) entities.
//! - **[audit]**: [`AuditLog`](audit::AuditLog), a hand-written service that calls the
//!   articles service with typed ids.
//! - **[lifecycle]**: [`BlogSystem`](lifecycle::BlogSystem), which starts and stops it all.
//!
//! The entry point in `main.rs` walks an article through its lifecycle.

pub mod audit;
pub mod lifecycle;
pub mod model;
