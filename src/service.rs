//! # Entity Service
//!
//! [`EntityService`] hosts the CRUD and lifecycle actions of one [`Entity`] on the broker.
//!
//! ## Repository Resolution
//! The service is built around an explicitly owned [`Connection`]. With
//! `reuse_local_repository` set, the repository for the entity's collection is resolved once
//! in [`Service::started`] and reused by every request; otherwise each request asks the
//! connection again. Tests can pin a repository with [`EntityService::with_repository`].
//!
//! ## Events
//! Write and lifecycle actions emit `<eventPrefix><fullName>.<event>` after the repository
//! call completes, unless the request sets `stopPropagation`. The prefix is read from the
//! request metadata (`eventPrefix`, empty by default) and forwarded on every internal call.

use crate::actions::{ActionSchemas, EntityAction, Lifecycle};
use crate::config::MixinOptions;
use crate::entity::Entity;
use crate::error::ServiceError;
use crate::repository::{Connection, Repository};
use async_trait::async_trait;
use serde_json::Value;
use service_broker::{ActionDef, ActionError, CallOptions, Context, Service};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Metadata key carrying the event namespace prefix.
pub const EVENT_PREFIX_META: &str = "eventPrefix";

// =============================================================================
// 1. THE SERVICE
// =============================================================================

enum RepositorySource {
    Connection(Arc<dyn Connection>),
    Fixed(Arc<dyn Repository>),
}

/// Broker service exposing the entity actions for `E`.
pub struct EntityService<E: Entity> {
    options: MixinOptions,
    source: RepositorySource,
    local: OnceCell<Arc<dyn Repository>>,
    schemas: ActionSchemas,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> EntityService<E> {
    /// Creates a service that takes its repository from `connection`.
    pub fn new(options: MixinOptions, connection: Arc<dyn Connection>) -> Result<Self, ServiceError> {
        Self::build(options, RepositorySource::Connection(connection))
    }

    /// Creates a service bound to one repository.
    pub fn with_repository(
        options: MixinOptions,
        repository: Arc<dyn Repository>,
    ) -> Result<Self, ServiceError> {
        Self::build(options, RepositorySource::Fixed(repository))
    }

    fn build(options: MixinOptions, source: RepositorySource) -> Result<Self, ServiceError> {
        Ok(Self {
            options,
            source,
            local: OnceCell::new(),
            schemas: ActionSchemas::compile()?,
            _entity: PhantomData,
        })
    }

    pub fn options(&self) -> &MixinOptions {
        &self.options
    }

    /// The repository for this entity's collection.
    pub async fn repository(&self) -> Result<Arc<dyn Repository>, ServiceError> {
        let connection = match &self.source {
            RepositorySource::Fixed(repository) => return Ok(Arc::clone(repository)),
            RepositorySource::Connection(connection) => connection,
        };
        if !self.options.reuse_local_repository {
            return Ok(connection.repository(E::COLLECTION).await?);
        }
        let repository = self
            .local
            .get_or_try_init(|| connection.repository(E::COLLECTION))
            .await?;
        Ok(Arc::clone(repository))
    }

    pub(crate) fn schemas(&self) -> &ActionSchemas {
        &self.schemas
    }

    /// `<prefix><fullName>.<event>` for the prefix carried by `ctx`.
    pub fn event_name(ctx: &Context, event: &str) -> String {
        let prefix = ctx.meta_str(EVENT_PREFIX_META).unwrap_or_default();
        format!("{prefix}{}.{event}", E::full_name())
    }

    pub(crate) async fn emit_event(&self, ctx: &Context, event: &str, payload: Value) {
        let name = Self::event_name(ctx, event);
        debug!(event = %name, "Emitting");
        ctx.emit(&name, payload).await;
    }

    /// Options for a call to one of this service's core actions.
    pub(crate) fn internal_call(ctx: &Context, action: EntityAction) -> (String, CallOptions) {
        let prefix = ctx.meta_str(EVENT_PREFIX_META).unwrap_or_default().to_string();
        (
            format!("{}.{}", E::full_name(), action.as_str()),
            CallOptions::new().with_meta(EVENT_PREFIX_META, prefix),
        )
    }

    async fn dispatch(&self, action: EntityAction, ctx: &mut Context) -> Result<Value, ServiceError> {
        match action {
            EntityAction::List => self.list(ctx).await,
            EntityAction::ListDrafts => self.list_drafts(ctx).await,
            EntityAction::ListArchive => self.list_archive(ctx).await,
            EntityAction::GetById => self.get_by_id(ctx).await,
            EntityAction::InsertOne => self.insert_one(ctx).await,
            EntityAction::PatchOneByIdRest => self.patch_one_by_id_rest(ctx).await,
            EntityAction::PatchOneById => self.patch_one_by_id(ctx).await,
            EntityAction::PatchOneRest => self.patch_one_rest(ctx).await,
            EntityAction::PatchOne => self.patch_one(ctx).await,
            EntityAction::ReplaceOneRest => self.replace_one_rest(ctx).await,
            EntityAction::ReplaceOne => self.replace_one(ctx).await,
            EntityAction::DeleteOne => self.delete_one(ctx).await,
            EntityAction::Publish => self.transition(Lifecycle::Publish, ctx).await,
            EntityAction::Archive => self.transition(Lifecycle::Archive, ctx).await,
            EntityAction::Unpublish => self.transition(Lifecycle::Unpublish, ctx).await,
        }
    }
}

// =============================================================================
// 2. BROKER INTEGRATION
// =============================================================================

#[async_trait]
impl<E: Entity> Service for EntityService<E> {
    fn name(&self) -> &str {
        E::COLLECTION
    }

    fn version(&self) -> Option<&str> {
        E::VERSION
    }

    fn actions(&self) -> Vec<ActionDef> {
        EntityAction::ALL.iter().map(EntityAction::definition).collect()
    }

    async fn started(&self) -> Result<(), ActionError> {
        if self.options.reuse_local_repository {
            self.repository().await.map_err(ActionError::from)?;
            info!(
                service = %E::full_name(),
                db = %self.options.db_name,
                "Repository resolved"
            );
        }
        Ok(())
    }

    async fn handle(&self, ctx: &mut Context) -> Result<Value, ActionError> {
        let Some(action) = EntityAction::parse(ctx.action_name()) else {
            return Err(ActionError::new(
                404,
                "ACTION_NOT_FOUND",
                format!("Unknown action {}", ctx.action()),
            ));
        };
        self.dispatch(action, ctx).await.map_err(|err| {
            warn!(
                service = %E::full_name(),
                action = action.as_str(),
                error = %err,
                "Action failed"
            );
            ActionError::from(err)
        })
    }
}
