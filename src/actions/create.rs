use super::{decode_document, serialize_document};
use crate::entity::Entity;
use crate::error::ServiceError;
use crate::params::unmerge_and_validate;
use crate::service::EntityService;
use serde_json::Value;
use service_broker::Context;

impl<E: Entity> EntityService<E> {
    pub(crate) async fn insert_one(&self, ctx: &mut Context) -> Result<Value, ServiceError> {
        let mut params = unmerge_and_validate(ctx, &self.schemas().insert_one, &[])?;
        let document = decode_document(params.take_body(), "body")?;

        let inserted = self.repository().await?.insert_one(document).await?;
        let serialized = serialize_document(inserted);

        if !params.query_flag("stopPropagation") {
            self.emit_event(ctx, "created", serialized.clone()).await;
        }
        Ok(serialized)
    }
}
