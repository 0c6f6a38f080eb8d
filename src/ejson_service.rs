//! # Extended-JSON Services
//!
//! [`EjsonService`] lets a service work with [`Bson`] values while the broker carries plain
//! JSON. Inbound parameter bags are decoded once before the wrapped handler runs and results
//! are encoded on the way out. Outbound calls made with [`call_remote`](crate::call_remote)
//! complete the picture: extended types survive every hop.

use crate::ejson::{self, Bson};
use crate::error::ServiceError;
use async_trait::async_trait;
use serde_json::Value;
use service_broker::{ActionDef, ActionError, Context, Service};
use tracing::warn;

/// A service whose handlers take and return extended values.
#[async_trait]
pub trait EjsonActions: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn version(&self) -> Option<&str> {
        None
    }

    fn actions(&self) -> Vec<ActionDef>;

    async fn started(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Handles one call. `params` is the decoded parameter bag.
    async fn handle(&self, ctx: &mut Context, params: Bson) -> Result<Bson, ServiceError>;
}

/// Adapts an [`EjsonActions`] implementation to the broker's [`Service`] trait.
pub struct EjsonService<H> {
    inner: H,
}

impl<H: EjsonActions> EjsonService<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }
}

#[async_trait]
impl<H: EjsonActions> Service for EjsonService<H> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn version(&self) -> Option<&str> {
        self.inner.version()
    }

    fn actions(&self) -> Vec<ActionDef> {
        self.inner.actions()
    }

    async fn started(&self) -> Result<(), ActionError> {
        Ok(self.inner.started().await?)
    }

    async fn handle(&self, ctx: &mut Context) -> Result<Value, ActionError> {
        let outcome = match ejson::decode_if_extended(ctx.params.clone()) {
            Ok(params) => self.inner.handle(ctx, params).await,
            Err(err) => Err(err.into()),
        };
        match outcome {
            Ok(result) => Ok(ejson::serialize(&result)),
            Err(err) => {
                warn!(action = %ctx.action(), error = %err, "Action failed");
                Err(err.into())
            }
        }
    }
}
