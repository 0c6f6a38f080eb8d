//! Cross-service calls that keep extended types intact.

use crate::ejson::{self, Bson};
use crate::error::ServiceError;
use service_broker::{CallOptions, Caller};
use tracing::{debug, instrument};

/// Calls `action` with `params` encoded as extended JSON and decodes the result.
///
/// `options` are passed to the broker as given.
#[instrument(skip(caller, params, options))]
pub async fn call_remote<C>(
    caller: &C,
    action: &str,
    params: &Bson,
    options: CallOptions,
) -> Result<Bson, ServiceError>
where
    C: Caller + ?Sized,
{
    let wire = ejson::serialize(params);
    debug!("Calling remote action");
    let response = caller.call(action, wire, options).await?;
    Ok(ejson::deserialize(response)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ejson::{Document, ObjectId};
    use serde_json::json;
    use service_broker::mock::MockBroker;
    use service_broker::ActionResponse;

    #[tokio::test]
    async fn extended_values_cross_the_broker() {
        let mut broker = MockBroker::new();
        let id = ObjectId::parse_str("65a1f0c2e4b0a1b2c3d4e5f6").unwrap();
        broker.expect_call("authors.lookup").return_ok(json!({
            "_id": {"$oid": "65a1f0c2e4b0a1b2c3d4e5f6"},
            "joined": {"$date": "2024-01-12T08:30:00.000Z"}
        }));

        let mut params = Document::new();
        params.insert("id", Bson::ObjectId(id));
        let result = call_remote(
            &broker.client(),
            "authors.lookup",
            &Bson::Document(params),
            CallOptions::new().with_meta("eventPrefix", "audit."),
        )
        .await
        .unwrap();

        let doc = result.as_document().unwrap();
        assert_eq!(doc.get("_id"), Some(&Bson::ObjectId(id)));
        assert!(matches!(doc.get("joined"), Some(Bson::DateTime(_))));

        let calls = broker.calls();
        assert_eq!(calls[0].params, json!({"id": {"$oid": "65a1f0c2e4b0a1b2c3d4e5f6"}}));
        assert_eq!(calls[0].options.meta.get("eventPrefix"), Some(&json!("audit.")));
        broker.verify();
    }

    #[tokio::test]
    async fn remote_failures_propagate() {
        let (client, mut rx) = service_broker::mock::create_mock_broker(4);
        let pending = tokio::spawn(async move {
            call_remote(&client, "authors.lookup", &Bson::Null, CallOptions::new()).await
        });
        let (_, _, _, respond_to) = service_broker::mock::expect_call(&mut rx).await.unwrap();
        respond_to
            .send(Err(service_broker::BrokerError::Action(
                service_broker::ActionError::not_found("gone"),
            )))
            .unwrap();
        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, ServiceError::Broker(_)));

        let (client, mut rx) = service_broker::mock::create_mock_broker(4);
        let pending = tokio::spawn(async move {
            call_remote(&client, "authors.lookup", &Bson::Null, CallOptions::new()).await
        });
        let (_, _, _, respond_to) = service_broker::mock::expect_call(&mut rx).await.unwrap();
        respond_to
            .send(Ok(ActionResponse {
                data: json!({"$oid": "nope"}),
                meta: Default::default(),
            }))
            .unwrap();
        assert!(matches!(
            pending.await.unwrap().unwrap_err(),
            ServiceError::Codec(_)
        ));
    }
}
