//! Service errors and their response status codes.

use crate::messagebus::MessageBusError;
use crate::response::StatusCode;
use aas_assetsync_assetconnection::AssetConnectionError;
use aas_assetsync_core::{OperationStateError, ValueMappingError};
use aas_assetsync_persistence::PersistenceError;

/// Errors that end a request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    /// Reference or handle does not resolve
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    /// Malformed request
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Resource already exists
    #[error("conflict: {0}")]
    Conflict(String),
    /// Asset connection or provider failure
    #[error("asset connection error: {0}")]
    AssetConnection(#[from] AssetConnectionError),
    /// Value does not fit the element
    #[error("value mapping error: {0}")]
    ValueMapping(#[from] ValueMappingError),
    /// Store failure other than not-found
    #[error("persistence error: {0}")]
    Persistence(PersistenceError),
    /// Message bus failure
    #[error("message bus error: {0}")]
    MessageBus(#[from] MessageBusError),
    /// Invalid operation result transition
    #[error("operation state error: {0}")]
    OperationState(#[from] OperationStateError),
    /// Missing provider or other configuration problem
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ServiceError {
    /// Response status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::ResourceNotFound(_) => StatusCode::ClientErrorResourceNotFound,
            ServiceError::BadRequest(_) => StatusCode::ClientErrorBadRequest,
            ServiceError::Conflict(_) => StatusCode::ClientErrorResourceConflict,
            _ => StatusCode::ServerInternalError,
        }
    }
}

impl From<PersistenceError> for ServiceError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound(what) => ServiceError::ResourceNotFound(what),
            PersistenceError::InvalidElement(detail) => ServiceError::BadRequest(detail),
            other => ServiceError::Persistence(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aas_assetsync_core::{KeyType, Reference};

    #[test]
    fn status_codes_follow_error_class() {
        let not_found: ServiceError = PersistenceError::NotFound("urn:x".to_string()).into();
        assert_eq!(not_found.status_code(), StatusCode::ClientErrorResourceNotFound);

        let invalid: ServiceError = PersistenceError::InvalidElement("x".to_string()).into();
        assert_eq!(invalid.status_code(), StatusCode::ClientErrorBadRequest);

        let storage: ServiceError = PersistenceError::Storage("disk".to_string()).into();
        assert_eq!(storage.status_code(), StatusCode::ServerInternalError);

        let io: ServiceError = AssetConnectionError::Io {
            reference: Reference::submodel("urn:sm").child(KeyType::Property, "A"),
            detail: "timeout".to_string(),
        }
        .into();
        assert_eq!(io.status_code(), StatusCode::ServerInternalError);
        assert_eq!(
            ServiceError::Conflict("x".to_string()).status_code(),
            StatusCode::ClientErrorResourceConflict
        );
    }
}
