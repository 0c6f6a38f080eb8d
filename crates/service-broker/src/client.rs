//! # Broker Client
//!
//! This module defines the cloneable handle used to talk to a running [`ServiceBroker`](crate::ServiceBroker).

use crate::error::BrokerError;
use crate::event::EventStream;
use crate::message::{ActionResponse, BrokerRequest, CallOptions, Event};
use crate::service::ServiceInfo;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, warn};

/// ## BrokerClient
///
/// Forwards calls, emits and subscriptions to the broker loop over a Tokio mpsc channel and
/// receives results over oneshot channels. Holds only a sender, so cloning is cheap. The
/// broker shuts down once every client (and every in-flight handler) has been dropped.
#[derive(Debug, Clone)]
pub struct BrokerClient {
    sender: mpsc::Sender<BrokerRequest>,
}

impl BrokerClient {
    pub fn new(sender: mpsc::Sender<BrokerRequest>) -> Self {
        Self { sender }
    }

    /// Calls `<service>.<action>` and returns the handler's result.
    #[instrument(skip(self, params, options))]
    pub async fn call(
        &self,
        action: &str,
        params: Value,
        options: CallOptions,
    ) -> Result<Value, BrokerError> {
        debug!("Sending request");
        Ok(self.call_with_meta(action, params, options).await?.data)
    }

    /// Like [`BrokerClient::call`], but also returns the callee's final metadata.
    pub async fn call_with_meta(
        &self,
        action: &str,
        params: Value,
        options: CallOptions,
    ) -> Result<ActionResponse, BrokerError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(BrokerRequest::Call {
                action: action.to_string(),
                params,
                options,
                respond_to,
            })
            .await
            .map_err(|_| BrokerError::BrokerClosed)?;
        response.await.map_err(|_| BrokerError::BrokerDropped)?
    }

    /// Broadcasts an event. Fire-and-forget: a closed broker is logged, not reported.
    pub async fn emit(&self, event: &str, payload: Value) {
        self.emit_from(event, payload, None).await;
    }

    pub(crate) async fn emit_from(&self, name: &str, payload: Value, sender: Option<String>) {
        let event = Event {
            name: name.to_string(),
            payload,
            sender,
        };
        if self.sender.send(BrokerRequest::Emit { event }).await.is_err() {
            warn!(event = name, "Emit on closed broker");
        }
    }

    /// Subscribes to events whose name matches `pattern` (`*` = one segment, `**` = the rest).
    pub async fn subscribe(&self, pattern: &str) -> Result<EventStream, BrokerError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(BrokerRequest::Subscribe {
                pattern: pattern.to_string(),
                sender,
                respond_to,
            })
            .await
            .map_err(|_| BrokerError::BrokerClosed)?;
        response.await.map_err(|_| BrokerError::BrokerDropped)??;
        Ok(EventStream::new(receiver))
    }

    pub async fn services(&self) -> Result<Vec<ServiceInfo>, BrokerError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(BrokerRequest::Services { respond_to })
            .await
            .map_err(|_| BrokerError::BrokerClosed)?;
        response.await.map_err(|_| BrokerError::BrokerDropped)?
    }

    /// Resolves once every request queued before it (including emits) has been processed.
    pub async fn flush(&self) -> Result<(), BrokerError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(BrokerRequest::Flush { respond_to })
            .await
            .map_err(|_| BrokerError::BrokerClosed)?;
        response.await.map_err(|_| BrokerError::BrokerDropped)?
    }
}
