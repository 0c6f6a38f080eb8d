use crate::ejson::EjsonError;
use crate::repository::{PreventedResult, RepositoryError};
use crate::schema::{SchemaError, ValidationError};
use serde_json::json;
use service_broker::{ActionError, BrokerError};

/// Errors produced by entity service handlers.
///
/// Handlers return `ServiceError` internally; it becomes an [`ActionError`] only when the
/// handler hands its result back to the broker.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    InvalidParams(#[from] ValidationError),
    #[error("Missing id in params")]
    MissingId,
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    #[error("{0}")]
    Prevented(PreventedResult),
    #[error(transparent)]
    Codec(#[from] EjsonError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Broker(#[from] BrokerError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl From<PreventedResult> for ServiceError {
    fn from(prevented: PreventedResult) -> Self {
        ServiceError::Prevented(prevented)
    }
}

impl From<ServiceError> for ActionError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::InvalidParams(validation) => ActionError::validation(message)
                .with_data(json!({ "issues": validation.issues })),
            ServiceError::MissingId
            | ServiceError::InvalidId(_)
            | ServiceError::InvalidFilter(_)
            | ServiceError::InvalidDocument(_) => ActionError::validation(message),
            ServiceError::Prevented(prevented) => {
                ActionError::new(409, "PREVENTED_RESULT", message).with_data(json!({
                    "operation": prevented.operation,
                    "reason": prevented.reason,
                }))
            }
            ServiceError::Codec(_) => ActionError::new(422, "INVALID_EXTENDED_JSON", message),
            ServiceError::Repository(RepositoryError::NotFound(_)) => ActionError::not_found(message),
            ServiceError::Repository(RepositoryError::DuplicateKey(_)) => {
                ActionError::new(409, "DUPLICATE_KEY", message)
            }
            ServiceError::Repository(
                RepositoryError::InvalidDocument(_) | RepositoryError::UnsupportedFilter(_),
            ) => ActionError::validation(message),
            ServiceError::Repository(_) => ActionError::new(500, "REPOSITORY_ERROR", message),
            ServiceError::Broker(inner) => inner.into(),
            ServiceError::Schema(_) => ActionError::internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prevented_results_carry_their_reason() {
        let err: ActionError =
            ServiceError::from(PreventedResult::new("listDrafts", "disabled")).into();
        assert_eq!(err.code, 409);
        assert_eq!(err.kind, "PREVENTED_RESULT");
        assert_eq!(err.data, Some(json!({"operation": "listDrafts", "reason": "disabled"})));
    }

    #[test]
    fn missing_id_is_a_validation_error() {
        let err: ActionError = ServiceError::MissingId.into();
        assert_eq!(err, ActionError::validation("Missing id in params"));
    }

    #[test]
    fn oversized_integers_are_rejected_as_invalid_input() {
        let err: ActionError =
            ServiceError::from(EjsonError::IntegerOutOfRange("18446744073709551615".into())).into();
        assert_eq!(err.code, 422);
        assert_eq!(err.kind, "INVALID_EXTENDED_JSON");
    }

    #[test]
    fn remote_errors_pass_through() {
        let remote = ActionError::not_found("gone");
        let err: ActionError = ServiceError::Broker(BrokerError::Action(remote.clone())).into();
        assert_eq!(err, remote);
    }
}
