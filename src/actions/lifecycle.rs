use super::{serialize_document, stop_propagation};
use crate::entity::Entity;
use crate::error::ServiceError;
use crate::id::resolve_id;
use crate::service::EntityService;
use serde_json::Value;
use service_broker::Context;

/// Status transitions reachable through the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Publish,
    Archive,
    Unpublish,
}

impl Lifecycle {
    /// Suffix of the event emitted after the transition.
    pub fn event(&self) -> &'static str {
        match self {
            Lifecycle::Publish => "published",
            Lifecycle::Archive => "archived",
            Lifecycle::Unpublish => "unpublished",
        }
    }
}

impl<E: Entity> EntityService<E> {
    pub(crate) async fn transition(
        &self,
        lifecycle: Lifecycle,
        ctx: &mut Context,
    ) -> Result<Value, ServiceError> {
        let id = resolve_id::<E>(ctx)?;
        let repository = self.repository().await?;
        let outcome = match lifecycle {
            Lifecycle::Publish => repository.publish_by_id(id).await?,
            Lifecycle::Archive => repository.archive_by_id(id).await?,
            Lifecycle::Unpublish => repository.unpublish_by_id(id).await?,
        };
        let serialized = serialize_document(outcome.into_result()?.to_document());

        if !stop_propagation(&ctx.params) {
            self.emit_event(ctx, lifecycle.event(), serialized.clone()).await;
        }
        Ok(serialized)
    }
}
