//! # Service Trait
//!
//! The `Service` trait is the contract every unit hosted by the [`ServiceBroker`](crate::ServiceBroker)
//! implements: a name (optionally versioned), an action table, lifecycle hooks and a single
//! `handle` entry point that dispatches on the action name carried by the [`Context`].

use crate::context::Context;
use crate::error::ActionError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Who may invoke an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Callable over the broker and exposed through REST aliases.
    Published,
    /// Callable over the broker only (other services, internal delegation).
    Public,
}

/// One entry of a service's action table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDef {
    pub name: String,
    /// REST alias such as `"GET /:id"`; `None` for broker-only actions.
    pub rest: Option<String>,
    pub visibility: Visibility,
}

impl ActionDef {
    /// A published action with a REST alias.
    pub fn rest(name: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rest: Some(route.into()),
            visibility: Visibility::Published,
        }
    }

    /// A broker-only action.
    pub fn internal(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rest: None,
            visibility: Visibility::Public,
        }
    }
}

/// Introspection snapshot of a registered service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: Option<String>,
    pub full_name: String,
    pub actions: Vec<ActionDef>,
}

/// Builds a service full name: `v<version>.<name>` for numeric versions, `<version>.<name>`
/// for other version strings and plain `<name>` otherwise.
pub fn full_name(name: &str, version: Option<&str>) -> String {
    match version {
        Some(v) if v.parse::<f64>().is_ok() => format!("v{v}.{name}"),
        Some(v) => format!("{v}.{name}"),
        None => name.to_string(),
    }
}

/// Trait that any unit hosted by the broker must implement.
///
/// # Provided Methods (Hooks)
/// [`Service::started`] and [`Service::stopped`] default to doing nothing. The broker calls
/// them once when its loop starts and once after it drains.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn version(&self) -> Option<&str> {
        None
    }

    fn full_name(&self) -> String {
        full_name(self.name(), self.version())
    }

    /// The action table. Calls to names missing from this table never reach `handle`.
    fn actions(&self) -> Vec<ActionDef>;

    async fn started(&self) -> Result<(), ActionError> {
        Ok(())
    }

    async fn stopped(&self) -> Result<(), ActionError> {
        Ok(())
    }

    /// Handles one call. The action is available through [`Context::action_name`].
    async fn handle(&self, ctx: &mut Context) -> Result<Value, ActionError>;

    fn info(&self) -> ServiceInfo {
        ServiceInfo {
            name: self.name().to_string(),
            version: self.version().map(str::to_string),
            full_name: self.full_name(),
            actions: self.actions(),
        }
    }
}
