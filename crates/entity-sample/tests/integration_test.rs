use entity_sample::lifecycle::BlogSystem;
use entity_sample::model::{ArticleCreate, AuthorCreate};
use entity_service::config::{MixinOptions, ServiceConfig};
use serde_json::json;
use service_broker::{BrokerError, CallOptions};

fn config() -> ServiceConfig {
    ServiceConfig {
        mixin: MixinOptions::new("blog-test"),
        broker_buffer: 16,
        request_timeout_ms: Some(2_000),
    }
}

/// Full run through the sample: create, edit, publish, snapshot, shut down.
#[tokio::test]
async fn test_article_lifecycle_end_to_end() {
    let system = BlogSystem::start(&config()).expect("Failed to start system");
    let client = system.client.clone();
    let mut events = client.subscribe("**").await.unwrap();

    let author = AuthorCreate {
        id: 7,
        name: "Ada".to_string(),
    };
    client
        .call(
            "authors.insertOne",
            serde_json::to_value(&author).unwrap(),
            CallOptions::new(),
        )
        .await
        .expect("Failed to create author");

    let fetched = client
        .call("authors.getById", json!({"id": "7"}), CallOptions::new())
        .await
        .expect("Failed to get author");
    assert_eq!(fetched["name"], json!("Ada"));

    let article = client
        .call(
            "v1.articles.insertOne",
            serde_json::to_value(ArticleCreate {
                title: "Hello".to_string(),
                body: "First post".to_string(),
                author: 7,
            })
            .unwrap(),
            CallOptions::new(),
        )
        .await
        .expect("Failed to create article");
    let id = article["_id"].clone();
    assert!(id["$oid"].is_string());

    client
        .call(
            "v1.articles.patchOneByIdRest",
            json!({"id": id, "title": "Hello, world"}),
            CallOptions::new().with_meta("eventPrefix", "editor."),
        )
        .await
        .expect("Failed to patch");
    client
        .call("v1.articles.publish", json!({"id": id}), CallOptions::new())
        .await
        .expect("Failed to publish");

    let snapshot = client
        .call("audit.snapshot", json!({"id": id}), CallOptions::new())
        .await
        .expect("Failed to snapshot");
    assert_eq!(snapshot["articleId"], id);
    assert_eq!(snapshot["article"]["title"], json!("Hello, world"));
    assert_eq!(snapshot["article"]["_meta"]["status"], json!("PUBLISHED"));
    assert!(snapshot["capturedAt"]["$date"].is_string());

    let history = client
        .call("audit.history", json!({"id": id}), CallOptions::new())
        .await
        .expect("Failed to read history");
    assert_eq!(history.as_array().map(Vec::len), Some(1));

    client.flush().await.unwrap();
    let names: Vec<String> = events.drain().into_iter().map(|event| event.name).collect();
    assert_eq!(
        names,
        vec![
            "authors.created",
            "v1.articles.created",
            "editor.v1.articles.updated",
            "v1.articles.published",
        ]
    );

    drop(client);
    drop(events);
    system.shutdown().await.expect("Failed to shut down");
}

#[tokio::test]
async fn test_snapshot_of_unknown_article_is_empty() {
    let system = BlogSystem::start(&config()).unwrap();

    let snapshot = system
        .client
        .call(
            "audit.snapshot",
            json!({"id": {"$oid": "65a1f0c2e4b0a1b2c3d4e5f6"}}),
            CallOptions::new(),
        )
        .await
        .unwrap();
    assert!(snapshot.is_null());

    let err = system
        .client
        .call("audit.history", json!({"id": "nope"}), CallOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::Action(ref e) if e.code == 422));

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_services_are_registered() {
    let system = BlogSystem::start(&config()).unwrap();
    let mut names: Vec<String> = system
        .client
        .services()
        .await
        .unwrap()
        .into_iter()
        .map(|info| info.full_name)
        .collect();
    names.sort();
    assert_eq!(names, ["audit", "authors", "v1.articles"]);
    system.shutdown().await.unwrap();
}
