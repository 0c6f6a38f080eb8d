use super::serialize_documents;
use crate::entity::Entity;
use crate::error::ServiceError;
use crate::params::{truthy, unmerge_and_validate, RequestParams};
use crate::repository::{EntityStatus, PipelineStage};
use crate::service::EntityService;
use serde_json::Value;
use service_broker::Context;

const DEFAULT_PAGE: u64 = 1;
const DEFAULT_LIMIT: u64 = 100;

impl<E: Entity> EntityService<E> {
    pub(crate) async fn list(&self, ctx: &mut Context) -> Result<Value, ServiceError> {
        let params = unmerge_and_validate(ctx, &self.schemas().list, &[])?;
        let pipeline = list_pipeline(&params);
        let docs = self.repository().await?.list(pipeline).await?;
        Ok(serialize_documents(docs))
    }

    pub(crate) async fn list_drafts(&self, _ctx: &mut Context) -> Result<Value, ServiceError> {
        let docs = self.repository().await?.list_drafts().await?.into_result()?;
        Ok(serialize_documents(docs))
    }

    pub(crate) async fn list_archive(&self, _ctx: &mut Context) -> Result<Value, ServiceError> {
        let docs = self.repository().await?.list_archive().await?.into_result()?;
        Ok(serialize_documents(docs))
    }
}

/// Status filter first, then pagination when `page` or `limit` is given.
pub(crate) fn list_pipeline(params: &RequestParams) -> Vec<PipelineStage> {
    let mut statuses = vec![EntityStatus::Published];
    if params.query_flag("drafts") {
        statuses.push(EntityStatus::Draft);
    }
    if params.query_flag("archived") {
        statuses.push(EntityStatus::Archived);
    }
    let mut pipeline = vec![PipelineStage::status_in(&statuses)];

    let page = params.query_value("page").filter(|v| truthy(v));
    let limit = params.query_value("limit").filter(|v| truthy(v));
    if page.is_some() || limit.is_some() {
        let page = page.and_then(positive_whole).unwrap_or(DEFAULT_PAGE);
        let limit = limit.and_then(positive_whole).unwrap_or(DEFAULT_LIMIT);
        pipeline.push(PipelineStage::Skip((page - 1).saturating_mul(limit)));
        pipeline.push(PipelineStage::Limit(limit));
    }
    pipeline
}

fn positive_whole(value: &Value) -> Option<u64> {
    let n = value.as_f64()?.floor();
    (n >= 1.0 && n < u64::MAX as f64).then_some(n as u64)
}
