//! # System Lifecycle
//!
//! [`BlogSystem`] owns everything the sample runs: the repository connection, the broker
//! task and the client handed to callers.
//!
//! Startup order:
//! 1. open the connection once from the configured [`MixinOptions`](entity_service::config::MixinOptions),
//! 2. register the services, each holding a clone of the connection,
//! 3. spawn the broker loop, which runs the services' `started` hooks.
//!
//! Shutdown runs in reverse: dropping the last client ends the broker loop, the broker task
//! is awaited, then the connection is closed.

use crate::audit::AuditLog;
use crate::model::{Article, Author};
use entity_service::config::ServiceConfig;
use entity_service::repository::{MemoryConnection, RepositoryError};
use entity_service::{EjsonService, EntityService, ServiceError};
use service_broker::{BrokerClient, ServiceBroker};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("Broker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub struct BlogSystem {
    pub client: BrokerClient,
    connection: Arc<MemoryConnection>,
    handle: JoinHandle<()>,
}

impl BlogSystem {
    pub fn start(config: &ServiceConfig) -> Result<Self, SystemError> {
        let connection = Arc::new(MemoryConnection::open(&config.mixin)?);

        let (mut broker, client) = ServiceBroker::new(config.broker_buffer);
        broker = broker.with_default_timeout(config.request_timeout());
        broker
            .register(EntityService::<Article>::new(
                config.mixin.clone(),
                connection.clone(),
            )?)
            .register(EntityService::<Author>::new(
                config.mixin.clone(),
                connection.clone(),
            )?)
            .register(EjsonService::new(AuditLog::new()));

        let handle = tokio::spawn(broker.run());
        info!(db = %connection.db_name(), uri = %connection.uri(), "Blog system started");

        Ok(Self {
            client,
            connection,
            handle,
        })
    }

    pub async fn shutdown(self) -> Result<(), SystemError> {
        drop(self.client);
        self.handle.await?;
        self.connection.close().await;
        info!("Blog system stopped");
        Ok(())
    }
}
