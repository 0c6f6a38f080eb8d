//! # Mock Broker & Testing Guide
//!
//! `MockBroker` hands out a real [`BrokerClient`] whose requests are answered in-memory from
//! a queue of expectations. It lets you unit-test a handler that calls other services without
//! registering those services anywhere.
//!
//! | Feature | MockBroker | Real ServiceBroker |
//! |---------|------------|--------------------|
//! | **Speed** | Instant (in-memory) | Fast (spawns a task per call) |
//! | **Determinism** | 100% Deterministic | Subject to scheduler |
//! | **Callee** | Scripted responses | Real services |
//! | **Error Injection** | Easy (`return_err`) | Requires a failing service |
//!
//! ```rust
//! use serde_json::json;
//! use service_broker::mock::MockBroker;
//! use service_broker::{BrokerError, CallOptions, Context};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut mock = MockBroker::new();
//!     mock.expect_call("articles.patchOneById").return_ok(json!({"modifiedCount": 1}));
//!     mock.expect_call("articles.get").return_err(BrokerError::BrokerClosed);
//!
//!     let ctx = Context::new("articles.patchOneByIdRest", json!({}), mock.client());
//!     let reply = ctx
//!         .call("articles.patchOneById", json!({"id": "a1"}), CallOptions::new())
//!         .await
//!         .unwrap();
//!     assert_eq!(reply, json!({"modifiedCount": 1}));
//!
//!     let failed = ctx.call("articles.get", json!({}), CallOptions::new()).await;
//!     assert!(matches!(failed, Err(BrokerError::BrokerClosed)));
//!
//!     assert_eq!(mock.calls()[0].params, json!({"id": "a1"}));
//!     mock.verify();
//! }
//! ```
//!
//! Emitted events are recorded too. Emits are fire-and-forget, so call
//! [`BrokerClient::flush`] before reading [`MockBroker::events`].

use crate::client::BrokerClient;
use crate::error::BrokerError;
use crate::message::{ActionResponse, BrokerRequest, CallOptions, Event, Meta};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

struct Expectation {
    action: String,
    response: Result<ActionResponse, BrokerError>,
}

/// A call observed by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub action: String,
    pub params: Value,
    pub options: CallOptions,
}

#[derive(Default)]
struct MockState {
    expectations: VecDeque<Expectation>,
    calls: Vec<RecordedCall>,
    events: Vec<Event>,
    subscribers: Vec<(String, mpsc::UnboundedSender<Event>)>,
}

/// A mock broker with expectation tracking for fluent testing.
pub struct MockBroker {
    client: BrokerClient,
    state: Arc<Mutex<MockState>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBroker {
    /// Creates a new mock with no expectations. Must be called inside a Tokio runtime.
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::channel::<BrokerRequest>(100);
        let state = Arc::new(Mutex::new(MockState::default()));
        let state_clone = state.clone();

        let handle = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                let mut state = state_clone.lock().unwrap();
                match request {
                    BrokerRequest::Call {
                        action,
                        params,
                        options,
                        respond_to,
                    } => {
                        let expectation = state.expectations.pop_front();
                        state.calls.push(RecordedCall {
                            action: action.clone(),
                            params,
                            options,
                        });
                        match expectation {
                            Some(expected) if expected.action == action => {
                                let _ = respond_to.send(expected.response);
                            }
                            Some(expected) => panic!(
                                "Unexpected call: expected {}, got {}",
                                expected.action, action
                            ),
                            None => panic!("Unexpected call: {action}"),
                        }
                    }
                    BrokerRequest::Emit { event } => {
                        for (pattern, subscriber) in &state.subscribers {
                            if crate::event::pattern_matches(pattern, &event.name) {
                                let _ = subscriber.send(event.clone());
                            }
                        }
                        state.events.push(event);
                    }
                    BrokerRequest::Subscribe {
                        pattern,
                        sender,
                        respond_to,
                    } => {
                        state.subscribers.push((pattern, sender));
                        let _ = respond_to.send(Ok(()));
                    }
                    BrokerRequest::Services { respond_to } => {
                        let _ = respond_to.send(Ok(Vec::new()));
                    }
                    BrokerRequest::Flush { respond_to } => {
                        let _ = respond_to.send(Ok(()));
                    }
                }
            }
        });

        Self {
            client: BrokerClient::new(sender),
            state,
            _handle: handle,
        }
    }

    /// Returns a client wired to this mock.
    pub fn client(&self) -> BrokerClient {
        self.client.clone()
    }

    /// Expects the next call to target `action`.
    pub fn expect_call(&mut self, action: &str) -> CallExpectationBuilder {
        CallExpectationBuilder {
            action: action.to_string(),
            state: self.state.clone(),
        }
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Every event received so far, in order.
    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let state = self.state.lock().unwrap();
        if !state.expectations.is_empty() {
            panic!(
                "Not all expectations were met. {} remaining",
                state.expectations.len()
            );
        }
    }
}

/// Builder for call expectations.
pub struct CallExpectationBuilder {
    action: String,
    state: Arc<Mutex<MockState>>,
}

impl CallExpectationBuilder {
    /// Answers the call with `data` and empty metadata.
    pub fn return_ok(self, data: Value) {
        self.return_with_meta(data, Meta::new());
    }

    /// Answers the call with `data` and the given callee metadata.
    pub fn return_with_meta(self, data: Value, meta: Meta) {
        let mut state = self.state.lock().unwrap();
        state.expectations.push_back(Expectation {
            action: self.action,
            response: Ok(ActionResponse { data, meta }),
        });
    }

    /// Fails the call with `error`.
    pub fn return_err(self, error: BrokerError) {
        let mut state = self.state.lock().unwrap();
        state.expectations.push_back(Expectation {
            action: self.action,
            response: Err(error),
        });
    }
}

// =============================================================================
// LOW-LEVEL HELPERS
// =============================================================================

/// Creates a client and the raw receiver behind it.
///
/// Use this when a test needs to hold a request and answer it by hand (e.g. to assert the
/// exact parameters and metadata a handler forwards before it receives a response).
pub fn create_mock_broker(buffer_size: usize) -> (BrokerClient, mpsc::Receiver<BrokerRequest>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (BrokerClient::new(sender), receiver)
}

/// Helper to verify that the next message is a Call request.
pub async fn expect_call(
    receiver: &mut mpsc::Receiver<BrokerRequest>,
) -> Option<(
    String,
    Value,
    CallOptions,
    tokio::sync::oneshot::Sender<Result<ActionResponse, BrokerError>>,
)> {
    match receiver.recv().await {
        Some(BrokerRequest::Call {
            action,
            params,
            options,
            respond_to,
        }) => Some((action, params, options, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is an Emit request.
pub async fn expect_emit(receiver: &mut mpsc::Receiver<BrokerRequest>) -> Option<Event> {
    match receiver.recv().await {
        Some(BrokerRequest::Emit { event }) => Some(event),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use serde_json::json;

    #[tokio::test]
    async fn test_raw_mock_broker() {
        let (client, mut receiver) = create_mock_broker(10);

        let call_task = tokio::spawn(async move {
            client
                .call(
                    "articles.patchOneById",
                    json!({"id": "a1"}),
                    CallOptions::new().with_meta("eventPrefix", "tenant."),
                )
                .await
        });

        let (action, params, options, responder) = expect_call(&mut receiver)
            .await
            .expect("Expected Call request");
        assert_eq!(action, "articles.patchOneById");
        assert_eq!(params, json!({"id": "a1"}));
        assert_eq!(options.meta.get("eventPrefix"), Some(&json!("tenant.")));
        responder
            .send(Ok(ActionResponse {
                data: json!(true),
                meta: Meta::new(),
            }))
            .unwrap();

        assert_eq!(call_task.await.unwrap(), Ok(json!(true)));
    }

    #[tokio::test]
    async fn test_mock_broker_records_events() {
        let mock = MockBroker::new();
        let ctx = Context::new("articles.insertOne", json!({}), mock.client());

        ctx.emit("articles.created", json!({"name": "a"})).await;
        mock.client().flush().await.unwrap();

        let events = mock.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "articles.created");
        assert_eq!(events[0].sender.as_deref(), Some("articles"));
    }

    #[tokio::test]
    async fn test_mock_broker_with_expectations() {
        let mut mock = MockBroker::new();
        mock.expect_call("audit.record").return_ok(json!({"ok": true}));

        let reply = mock
            .client()
            .call("audit.record", json!({"n": 1}), CallOptions::new())
            .await
            .unwrap();
        assert_eq!(reply, json!({"ok": true}));
        assert_eq!(mock.calls().len(), 1);
        mock.verify();
    }
}
