use entity_sample::lifecycle::BlogSystem;
use entity_sample::model::{ArticleCreate, AuthorCreate};
use entity_service::config::{ConfigError, ServiceConfig, DB_NAME_KEY};
use entity_service::EVENT_PREFIX_META;
use serde_json::json;
use service_broker::tracing::setup_tracing;
use service_broker::CallOptions;
use std::collections::HashMap;
use tracing::{info, warn, Instrument};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn load_config() -> Result<ServiceConfig, ConfigError> {
    dotenvy::dotenv().ok();
    match ServiceConfig::from_env() {
        Err(ConfigError::Missing(key)) if key == DB_NAME_KEY => {
            warn!(key, "Not set, using database \"blog\"");
            ServiceConfig::from_kv(&HashMap::from([(DB_NAME_KEY.to_string(), "blog".to_string())]))
        }
        other => other,
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    setup_tracing();
    let config = load_config()?;
    let system = BlogSystem::start(&config)?;
    let client = system.client.clone();

    let author = AuthorCreate {
        id: 7,
        name: "Ada".to_string(),
    };
    client
        .call("authors.insertOne", serde_json::to_value(&author)?, CallOptions::new())
        .await?;

    let draft = ArticleCreate {
        title: "Hello".to_string(),
        body: "First post".to_string(),
        author: author.id,
    };
    let article = client
        .call("v1.articles.insertOne", serde_json::to_value(&draft)?, CallOptions::new())
        .await?;
    let id = article["_id"].clone();
    info!(%id, "Article created");

    let span = tracing::info_span!("editing", %id);
    async {
        client
            .call(
                "v1.articles.patchOneByIdRest",
                json!({"id": id, "title": "Hello, world"}),
                CallOptions::new().with_meta(EVENT_PREFIX_META, "editor."),
            )
            .await?;
        client
            .call("v1.articles.publish", json!({"id": id}), CallOptions::new())
            .await?;
        client
            .call("audit.snapshot", json!({"id": id}), CallOptions::new())
            .await?;
        Ok::<_, BoxError>(())
    }
    .instrument(span)
    .await?;

    let published = client
        .call("v1.articles.list", json!({}), CallOptions::new())
        .await?;
    info!(count = published.as_array().map_or(0, Vec::len), "Published articles");

    let history = client
        .call("audit.history", json!({"id": id}), CallOptions::new())
        .await?;
    info!(snapshots = history.as_array().map_or(0, Vec::len), "Audit history");

    drop(client);
    system.shutdown().await?;
    Ok(())
}
