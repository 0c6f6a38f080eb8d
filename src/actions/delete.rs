use super::{serialize_document, stop_propagation};
use crate::entity::Entity;
use crate::error::ServiceError;
use crate::id::resolve_id;
use crate::service::EntityService;
use serde_json::Value;
use service_broker::Context;

impl<E: Entity> EntityService<E> {
    pub(crate) async fn delete_one(&self, ctx: &mut Context) -> Result<Value, ServiceError> {
        let id = resolve_id::<E>(ctx)?;
        let result = self.repository().await?.delete_one_by_id(id).await?;
        let serialized = serialize_document(result.to_document());

        if !stop_propagation(&ctx.params) {
            self.emit_event(ctx, "deleted", serialized.clone()).await;
        }
        Ok(serialized)
    }
}
