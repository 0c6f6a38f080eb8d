//! # Request Context
//!
//! A `Context` is created by the broker for every inbound call. It carries the parameter bag,
//! the request metadata and a broker handle for outbound calls and emits.

use crate::client::BrokerClient;
use crate::error::BrokerError;
use crate::message::{CallOptions, Meta};
use async_trait::async_trait;
use serde_json::Value;

/// Metadata key read by REST transports to override the response status.
pub const STATUS_CODE_META: &str = "$statusCode";

/// Per-request context handed to [`Service::handle`](crate::Service::handle).
#[derive(Debug, Clone)]
pub struct Context {
    action: String,
    service: String,
    caller: Option<String>,
    /// The parameter bag, exactly as the caller sent it.
    pub params: Value,
    /// Request metadata. Handlers may write to it; the final map is returned to the caller.
    pub meta: Meta,
    broker: BrokerClient,
}

impl Context {
    /// Creates a context for `action` (a full `<service>.<action>` name).
    pub fn new(action: impl Into<String>, params: Value, broker: BrokerClient) -> Self {
        let action = action.into();
        let service = action
            .rsplit_once('.')
            .map(|(service, _)| service.to_string())
            .unwrap_or_default();
        Self {
            action,
            service,
            caller: None,
            params,
            meta: Meta::new(),
            broker,
        }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_caller(mut self, caller: Option<String>) -> Self {
        self.caller = caller;
        self
    }

    /// Full action name, e.g. `v1.articles.getById`.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Action name without the service prefix, e.g. `getById`.
    pub fn action_name(&self) -> &str {
        self.action
            .rsplit_once('.')
            .map(|(_, name)| name)
            .unwrap_or(&self.action)
    }

    /// Full name of the service handling this request.
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn caller(&self) -> Option<&str> {
        self.caller.as_deref()
    }

    pub fn broker(&self) -> &BrokerClient {
        &self.broker
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(Value::as_str)
    }

    pub fn set_status_code(&mut self, code: u16) {
        self.meta.insert(STATUS_CODE_META.to_string(), Value::from(code));
    }

    pub fn status_code(&self) -> Option<u16> {
        self.meta
            .get(STATUS_CODE_META)
            .and_then(Value::as_u64)
            .and_then(|code| u16::try_from(code).ok())
    }

    /// Calls another action. Metadata is NOT inherited; pass what the callee needs in
    /// `options.meta`.
    pub async fn call(
        &self,
        action: &str,
        params: Value,
        mut options: CallOptions,
    ) -> Result<Value, BrokerError> {
        if options.caller.is_none() {
            options.caller = Some(self.service.clone());
        }
        self.broker.call(action, params, options).await
    }

    /// Emits an event on behalf of this service. Delivery is not awaited.
    pub async fn emit(&self, event: &str, payload: Value) {
        self.broker
            .emit_from(event, payload, Some(self.service.clone()))
            .await;
    }
}

/// Anything that can issue a broker call.
#[async_trait]
pub trait Caller: Send + Sync {
    async fn call(
        &self,
        action: &str,
        params: Value,
        options: CallOptions,
    ) -> Result<Value, BrokerError>;
}

#[async_trait]
impl Caller for Context {
    async fn call(
        &self,
        action: &str,
        params: Value,
        options: CallOptions,
    ) -> Result<Value, BrokerError> {
        Context::call(self, action, params, options).await
    }
}

#[async_trait]
impl Caller for BrokerClient {
    async fn call(
        &self,
        action: &str,
        params: Value,
        options: CallOptions,
    ) -> Result<Value, BrokerError> {
        BrokerClient::call(self, action, params, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::create_mock_broker;
    use serde_json::json;

    #[tokio::test]
    async fn splits_action_and_service_names() {
        let (broker, _rx) = create_mock_broker(4);
        let ctx = Context::new("v2.articles.getById", json!({}), broker);
        assert_eq!(ctx.service(), "v2.articles");
        assert_eq!(ctx.action_name(), "getById");
    }

    #[tokio::test]
    async fn status_code_round_trips_through_meta() {
        let (broker, _rx) = create_mock_broker(4);
        let mut ctx = Context::new("articles.getById", json!({}), broker);
        assert_eq!(ctx.status_code(), None);
        ctx.set_status_code(404);
        assert_eq!(ctx.status_code(), Some(404));
        assert_eq!(ctx.meta.get(STATUS_CODE_META), Some(&json!(404)));
    }
}
