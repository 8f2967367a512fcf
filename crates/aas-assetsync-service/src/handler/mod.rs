//! Request handlers, one per request type.

pub mod operation;
pub mod shell;
pub mod submodel;
pub mod submodel_element;

use crate::context::RequestContext;
use crate::error::ServiceError;
use crate::response::{Response, StatusCode};
use aas_assetsync_assetconnection::AssetConnectionError;
use aas_assetsync_core::{KeyType, Reference};
use async_trait::async_trait;

/// Handles one request type.
///
/// Implementors provide [`handle`](Self::handle); [`process`](Self::process)
/// turns its outcome into a [`Response`] so no error escapes the handler.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Request type
    type Request: Send + 'static;
    /// Success payload
    type Payload: Send;

    /// Status of a successful response.
    const SUCCESS: StatusCode = StatusCode::Success;

    /// Execute the request.
    ///
    /// # Errors
    ///
    /// Returns the error to be mapped to a status code.
    async fn handle(
        &self,
        ctx: &RequestContext,
        request: Self::Request,
    ) -> Result<Self::Payload, ServiceError>;

    /// Execute the request and build the response.
    async fn process(&self, ctx: &RequestContext, request: Self::Request) -> Response<Self::Payload> {
        match self.handle(ctx, request).await {
            Ok(payload) => Response::success(Self::SUCCESS, payload),
            Err(err) => {
                if err.status_code() == StatusCode::ServerInternalError {
                    tracing::error!(error = %err, "Request failed");
                } else {
                    tracing::debug!(error = %err, "Request rejected");
                }
                Response::error(&err)
            }
        }
    }
}

/// Require `reference` to address a submodel element.
pub(crate) fn require_element_reference(reference: &Reference) -> Result<(), ServiceError> {
    if reference.first().key_type != KeyType::Submodel || reference.is_identifiable() {
        return Err(ServiceError::BadRequest(format!(
            "{reference} does not address a submodel element"
        )));
    }
    Ok(())
}

/// A missing operation provider is a configuration problem, not an I/O failure.
pub(crate) fn provider_lookup(err: AssetConnectionError) -> ServiceError {
    match err {
        AssetConnectionError::NotConfigured { .. } => ServiceError::Configuration(err.to_string()),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aas_assetsync_assetconnection::Capability;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn element_references_are_validated() {
        let submodel = Reference::submodel("urn:example:sm:1");
        assert_ok!(require_element_reference(&submodel.child(KeyType::Property, "A")));
        assert_err!(require_element_reference(&submodel));
        assert_err!(require_element_reference(
            &Reference::shell("urn:example:aas:1").child(KeyType::Property, "A")
        ));
    }

    #[test]
    fn missing_providers_are_configuration_errors() {
        let reference = Reference::submodel("urn:example:sm:1").child(KeyType::Operation, "Run");
        let err = provider_lookup(AssetConnectionError::NotConfigured {
            reference: reference.clone(),
            capability: Capability::Operation,
        });
        assert!(matches!(err, ServiceError::Configuration(_)));

        let err = provider_lookup(AssetConnectionError::Io {
            reference,
            detail: "timeout".to_string(),
        });
        assert!(matches!(err, ServiceError::AssetConnection(_)));
    }
}
