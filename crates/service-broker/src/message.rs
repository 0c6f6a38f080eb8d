//! # Broker Messages
//!
//! This module defines the message types exchanged between a [`BrokerClient`](crate::BrokerClient)
//! and the [`ServiceBroker`](crate::ServiceBroker) loop.
//!
//! Every payload is plain JSON ([`serde_json::Value`]). Richer document types have to be
//! encoded by the services themselves before they cross the broker.

use crate::error::BrokerError;
use crate::service::ServiceInfo;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Type alias for the one-shot response channel used by the broker.
pub type Response<T> = oneshot::Sender<Result<T, BrokerError>>;

/// Request metadata carried alongside the parameters of a call.
pub type Meta = serde_json::Map<String, Value>;

/// Per-call options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    /// Metadata handed to the callee's [`Context`](crate::Context).
    pub meta: Meta,
    /// Overrides the broker's default timeout for this call.
    pub timeout: Option<Duration>,
    /// Full name of the calling service, if any.
    pub caller: Option<String>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// The result of a call, including the callee's final metadata.
///
/// Handlers may write into their context metadata (e.g. a status code); the broker hands the
/// final map back so transports can act on it.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResponse {
    pub data: Value,
    pub meta: Meta,
}

/// A broadcast event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub name: String,
    pub payload: Value,
    /// Full name of the emitting service, if emitted from a handler.
    pub sender: Option<String>,
}

/// Internal message type sent to the broker loop.
///
/// - **Call**: Request/response. Resolved to `<service>.<action>` and run on its own task.
/// - **Emit**: Fire-and-forget broadcast to every matching subscription.
/// - **Subscribe**: Registers an event sink for a name pattern.
/// - **Services**: Introspection of the registered services.
/// - **Flush**: Completes once every request queued before it has been processed.
#[derive(Debug)]
pub enum BrokerRequest {
    Call {
        action: String,
        params: Value,
        options: CallOptions,
        respond_to: Response<ActionResponse>,
    },
    Emit {
        event: Event,
    },
    Subscribe {
        pattern: String,
        sender: mpsc::UnboundedSender<Event>,
        respond_to: Response<()>,
    },
    Services {
        respond_to: Response<Vec<ServiceInfo>>,
    },
    Flush {
        respond_to: Response<()>,
    },
}
