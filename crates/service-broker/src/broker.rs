//! # Service Broker
//!
//! This module defines the `ServiceBroker`, the loop that owns the service registry and the
//! event subscriptions. Registry and subscription changes are processed sequentially, so
//! neither needs a lock. Calls are dispatched to their own task: a handler may call back
//! into the broker (REST adapters delegating to internal actions do exactly that) without
//! blocking the loop.

use crate::client::BrokerClient;
use crate::context::Context;
use crate::error::BrokerError;
use crate::event::pattern_matches;
use crate::message::{ActionResponse, BrokerRequest, CallOptions, Event, Response};
use crate::service::Service;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct Subscription {
    pattern: String,
    sender: mpsc::UnboundedSender<Event>,
}

/// The broker that routes calls to services and broadcasts events.
///
/// # Usage Pattern
///
/// 1.  **Create**: `ServiceBroker::new()` returns the broker (server) and a [`BrokerClient`].
/// 2.  **Register**: add services with [`ServiceBroker::register`].
/// 3.  **Run**: spawn [`ServiceBroker::run`] in a background task.
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
/// use service_broker::{ActionDef, ActionError, CallOptions, Context, Service, ServiceBroker};
///
/// struct Greeter;
///
/// #[async_trait]
/// impl Service for Greeter {
///     fn name(&self) -> &str { "greeter" }
///     fn actions(&self) -> Vec<ActionDef> { vec![ActionDef::rest("hello", "GET /hello")] }
///     async fn handle(&self, ctx: &mut Context) -> Result<Value, ActionError> {
///         let name = ctx.params["name"].as_str().unwrap_or("world");
///         Ok(json!(format!("hello {name}")))
///     }
/// }
///
/// #[tokio::main]
/// async fn main() {
///     let (mut broker, client) = ServiceBroker::new(16);
///     broker.register(Greeter);
///     tokio::spawn(broker.run());
///
///     let reply = client
///         .call("greeter.hello", json!({"name": "Ada"}), CallOptions::new())
///         .await
///         .unwrap();
///     assert_eq!(reply, json!("hello Ada"));
/// }
/// ```
///
/// # Shutdown
///
/// The loop ends when every [`BrokerClient`] has been dropped and no handler is still
/// running. The broker itself only keeps a weak handle on its channel.
pub struct ServiceBroker {
    receiver: mpsc::Receiver<BrokerRequest>,
    handle: mpsc::WeakSender<BrokerRequest>,
    services: HashMap<String, Arc<dyn Service>>,
    subscriptions: Vec<Subscription>,
    default_timeout: Option<Duration>,
}

impl ServiceBroker {
    /// Creates a new `ServiceBroker` and its associated `BrokerClient`.
    ///
    /// * `buffer_size` - The capacity of the MPSC channel. When full, client calls wait.
    pub fn new(buffer_size: usize) -> (Self, BrokerClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let broker = Self {
            receiver,
            handle: sender.downgrade(),
            services: HashMap::new(),
            subscriptions: Vec::new(),
            default_timeout: None,
        };
        (broker, BrokerClient::new(sender))
    }

    /// Timeout applied to calls that don't set [`CallOptions::timeout`].
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn register<S: Service>(&mut self, service: S) -> &mut Self {
        self.register_arc(Arc::new(service))
    }

    pub fn register_arc(&mut self, service: Arc<dyn Service>) -> &mut Self {
        let full_name = service.full_name();
        if self.services.insert(full_name.clone(), service).is_some() {
            warn!(service = %full_name, "Service replaced");
        }
        self
    }

    /// Runs the broker loop until the channel closes.
    pub async fn run(mut self) {
        for (name, service) in &self.services {
            if let Err(e) = service.started().await {
                warn!(service = %name, error = %e, "started hook failed");
            }
        }
        info!(services = self.services.len(), "Broker started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                BrokerRequest::Call {
                    action,
                    params,
                    options,
                    respond_to,
                } => self.dispatch_call(action, params, options, respond_to),
                BrokerRequest::Emit { event } => self.broadcast(event),
                BrokerRequest::Subscribe {
                    pattern,
                    sender,
                    respond_to,
                } => {
                    debug!(%pattern, "Subscribe");
                    self.subscriptions.push(Subscription { pattern, sender });
                    let _ = respond_to.send(Ok(()));
                }
                BrokerRequest::Services { respond_to } => {
                    let mut infos: Vec<_> = self.services.values().map(|s| s.info()).collect();
                    infos.sort_by(|a, b| a.full_name.cmp(&b.full_name));
                    let _ = respond_to.send(Ok(infos));
                }
                BrokerRequest::Flush { respond_to } => {
                    let _ = respond_to.send(Ok(()));
                }
            }
        }

        for (name, service) in &self.services {
            if let Err(e) = service.stopped().await {
                warn!(service = %name, error = %e, "stopped hook failed");
            }
        }
        info!(services = self.services.len(), "Shutdown");
    }

    fn dispatch_call(
        &self,
        action: String,
        params: Value,
        options: CallOptions,
        respond_to: Response<ActionResponse>,
    ) {
        let Some((service_name, action_name)) = action.rsplit_once('.') else {
            warn!(%action, "Malformed action name");
            let _ = respond_to.send(Err(BrokerError::ActionNotFound(action)));
            return;
        };
        let Some(service) = self.services.get(service_name).cloned() else {
            warn!(%action, "Service not found");
            let _ = respond_to.send(Err(BrokerError::ServiceNotFound(service_name.to_string())));
            return;
        };
        if !service.actions().iter().any(|def| def.name == action_name) {
            warn!(%action, "Action not found");
            let _ = respond_to.send(Err(BrokerError::ActionNotFound(action)));
            return;
        }
        let Some(sender) = self.handle.upgrade() else {
            let _ = respond_to.send(Err(BrokerError::BrokerClosed));
            return;
        };

        debug!(%action, caller = ?options.caller, "Call");
        let timeout = options.timeout.or(self.default_timeout);
        let ctx = Context::new(action, params, BrokerClient::new(sender))
            .with_meta(options.meta)
            .with_caller(options.caller);

        tokio::spawn(async move {
            let mut ctx = ctx;
            let outcome = match timeout {
                Some(limit) => {
                    let limited = tokio::time::timeout(limit, service.handle(&mut ctx)).await;
                    match limited {
                        Ok(result) => result.map_err(BrokerError::from),
                        Err(_) => Err(BrokerError::RequestTimeout {
                            action: ctx.action().to_string(),
                            timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                        }),
                    }
                }
                None => service.handle(&mut ctx).await.map_err(BrokerError::from),
            };
            match &outcome {
                Ok(_) => debug!(action = %ctx.action(), "Call ok"),
                Err(e) => warn!(action = %ctx.action(), error = %e, "Call failed"),
            }
            let _ = respond_to.send(outcome.map(|data| ActionResponse {
                data,
                meta: ctx.meta,
            }));
        });
    }

    fn broadcast(&mut self, event: Event) {
        self.subscriptions.retain(|s| !s.sender.is_closed());
        let mut delivered = 0usize;
        for subscription in &self.subscriptions {
            if pattern_matches(&subscription.pattern, &event.name)
                && subscription.sender.send(event.clone()).is_ok()
            {
                delivered += 1;
            }
        }
        debug!(event = %event.name, delivered, "Emit");
    }
}
