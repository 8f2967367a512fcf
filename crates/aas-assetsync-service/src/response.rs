//! Protocol-neutral responses.

use crate::error::ServiceError;
use aas_assetsync_core::{
    AssetAdministrationShell, OperationHandle, OperationResult, Submodel, SubmodelElement,
};
use serde::Serialize;

/// Outcome class of a request, mapped to wire status codes by endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatusCode {
    /// 200
    Success,
    /// 201
    SuccessCreated,
    /// 204
    SuccessNoContent,
    /// 400
    ClientErrorBadRequest,
    /// 404
    ClientErrorResourceNotFound,
    /// 409
    ClientErrorResourceConflict,
    /// 500
    ServerInternalError,
}

impl StatusCode {
    /// HTTP equivalent.
    #[must_use]
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Success => 200,
            StatusCode::SuccessCreated => 201,
            StatusCode::SuccessNoContent => 204,
            StatusCode::ClientErrorBadRequest => 400,
            StatusCode::ClientErrorResourceNotFound => 404,
            StatusCode::ClientErrorResourceConflict => 409,
            StatusCode::ServerInternalError => 500,
        }
    }

    /// Whether this is a success status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.as_u16() < 300
    }
}

/// Status plus payload or error message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response<P> {
    /// Outcome
    pub status_code: StatusCode,
    /// Payload on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<P>,
    /// Error detail on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<P> Response<P> {
    /// A successful response.
    pub fn success(status_code: StatusCode, payload: P) -> Self {
        Self {
            status_code,
            payload: Some(payload),
            message: None,
        }
    }

    /// A failed response.
    pub fn error(err: &ServiceError) -> Self {
        Self {
            status_code: err.status_code(),
            payload: None,
            message: Some(err.to_string()),
        }
    }

    /// Convert the payload.
    pub fn map<Q>(self, f: impl FnOnce(P) -> Q) -> Response<Q> {
        Response {
            status_code: self.status_code,
            payload: self.payload.map(f),
            message: self.message,
        }
    }
}

/// Payload of any request, as returned by
/// [`RequestHandlerManager::execute`](crate::RequestHandlerManager::execute).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponsePayload {
    /// A shell
    Shell(AssetAdministrationShell),
    /// Several submodels
    Submodels(Vec<Submodel>),
    /// One submodel
    Submodel(Submodel),
    /// Several submodel elements
    SubmodelElements(Vec<SubmodelElement>),
    /// One submodel element
    SubmodelElement(SubmodelElement),
    /// Handle of a started invocation
    OperationHandle(OperationHandle),
    /// Result of an invocation
    OperationResult(OperationResult),
    /// No content
    Empty,
}
