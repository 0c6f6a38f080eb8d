//! # Observability & Tracing
//!
//! [`setup_tracing`] installs the process-wide subscriber. Everything in the workspace logs
//! through `tracing` with structured fields (`service`, `action`, `event`, `id`), so the
//! compact format stays readable without module paths.
//!
//! ```bash
//! RUST_LOG=info cargo run -p entity-sample     # calls, emits, mutations
//! RUST_LOG=debug cargo run -p entity-sample    # plus per-request repository traffic
//! RUST_LOG=service_broker=debug cargo run -p entity-sample
//! ```

/// Initializes the tracing subscriber, filtered by `RUST_LOG`.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
