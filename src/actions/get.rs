use super::serialize_document;
use crate::entity::Entity;
use crate::error::ServiceError;
use crate::id::resolve_id;
use crate::service::EntityService;
use serde_json::Value;
use service_broker::Context;
use tracing::debug;

impl<E: Entity> EntityService<E> {
    /// A missing entity is answered with `null` and a 404 status in the metadata.
    pub(crate) async fn get_by_id(&self, ctx: &mut Context) -> Result<Value, ServiceError> {
        let id = resolve_id::<E>(ctx)?;
        match self.repository().await?.get(id.clone()).await? {
            Some(doc) => Ok(serialize_document(doc)),
            None => {
                debug!(%id, "Entity not found");
                ctx.set_status_code(404);
                Ok(Value::Null)
            }
        }
    }
}
