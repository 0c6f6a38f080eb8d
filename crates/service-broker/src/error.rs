//! # Broker Errors
//!
//! This module defines the error types shared by the broker, its clients and the services
//! it hosts. Transport failures live in [`BrokerError`]; a handler failure travels back to
//! the caller as a structured [`ActionError`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured failure produced by an action handler.
///
/// Services convert their own error enums into an `ActionError` at the outermost handler
/// boundary. Callers receive it unchanged inside [`BrokerError::Action`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ActionError {
    /// HTTP-like status code (422 validation, 404 not found, 500 internal, ...).
    pub code: u16,
    /// Stable machine-readable error type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    /// Optional structured details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ActionError {
    pub fn new(code: u16, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            kind: kind.into(),
            message: message.into(),
            data: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(422, "VALIDATION_ERROR", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, "NOT_FOUND", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, "INTERNAL_ERROR", message)
    }

    /// Attaches structured details to the error.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Errors that can occur while talking to the broker.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BrokerError {
    #[error("Broker closed")]
    BrokerClosed,
    #[error("Broker dropped response channel")]
    BrokerDropped,
    #[error("Service not found: {0}")]
    ServiceNotFound(String),
    #[error("Action not found: {0}")]
    ActionNotFound(String),
    #[error("Request timed out: {action} after {timeout_ms}ms")]
    RequestTimeout { action: String, timeout_ms: u64 },
    /// The remote handler failed; the structured error is passed through as-is.
    #[error(transparent)]
    Action(#[from] ActionError),
}

impl From<BrokerError> for ActionError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::Action(inner) => inner,
            BrokerError::ServiceNotFound(_) | BrokerError::ActionNotFound(_) => {
                ActionError::new(404, "SERVICE_NOT_FOUND", err.to_string())
            }
            BrokerError::RequestTimeout { .. } => {
                ActionError::new(504, "REQUEST_TIMEOUT", err.to_string())
            }
            BrokerError::BrokerClosed | BrokerError::BrokerDropped => {
                ActionError::new(503, "BROKER_UNAVAILABLE", err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn remote_action_error_passes_through_unchanged() {
        let original = ActionError::validation("Missing id in params").with_data(json!({"field": "id"}));
        let converted: ActionError = BrokerError::Action(original.clone()).into();
        assert_eq!(converted, original);
    }

    #[test]
    fn transport_errors_map_to_status_codes() {
        let timeout: ActionError = BrokerError::RequestTimeout {
            action: "articles.get".into(),
            timeout_ms: 50,
        }
        .into();
        assert_eq!(timeout.code, 504);

        let missing: ActionError = BrokerError::ServiceNotFound("nope".into()).into();
        assert_eq!(missing.code, 404);
        assert_eq!(missing.kind, "SERVICE_NOT_FOUND");
    }

    #[test]
    fn action_error_wire_shape() {
        let err = ActionError::not_found("gone");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value, json!({"code": 404, "type": "NOT_FOUND", "message": "gone"}));
    }
}
