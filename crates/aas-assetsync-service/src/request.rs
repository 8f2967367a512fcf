//! Protocol-neutral requests and their dispatch.
//!
//! Endpoints translate their wire requests into a [`Request`] and hand it to
//! [`RequestHandlerManager::execute`].

use crate::context::RequestContext;
use crate::handler::operation::{
    GetOperationAsyncResultHandler, InvokeOperationAsyncHandler, InvokeOperationSyncHandler,
};
use crate::handler::shell::GetAssetAdministrationShellByIdHandler;
use crate::handler::submodel::{
    DeleteSubmodelByIdHandler, GetAllSubmodelsBySemanticIdHandler, GetAllSubmodelsHandler,
    GetSubmodelByIdHandler, PostSubmodelHandler, PutSubmodelHandler,
};
use crate::handler::submodel_element::{
    DeleteSubmodelElementByPathHandler, GetAllSubmodelElementsHandler,
    GetSubmodelElementByPathHandler, PostSubmodelElementByPathHandler,
    PutSubmodelElementByPathHandler, SetSubmodelElementValueByPathHandler,
};
use crate::handler::RequestHandler;
use crate::response::{Response, ResponsePayload};
use aas_assetsync_core::{ElementValue, Reference, Submodel, SubmodelElement};
use aas_assetsync_persistence::OutputModifier;

/// List every submodel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetAllSubmodelsRequest {
    /// Output view
    pub modifier: OutputModifier,
}

/// List the submodels with a semantic id.
#[derive(Debug, Clone, PartialEq)]
pub struct GetAllSubmodelsBySemanticIdRequest {
    /// Semantic id to match
    pub semantic_id: Reference,
    /// Output view
    pub modifier: OutputModifier,
}

/// Get one submodel.
#[derive(Debug, Clone, PartialEq)]
pub struct GetSubmodelByIdRequest {
    /// Submodel id
    pub id: String,
    /// Output view
    pub modifier: OutputModifier,
}

/// Create a submodel.
#[derive(Debug, Clone, PartialEq)]
pub struct PostSubmodelRequest {
    /// New submodel
    pub submodel: Submodel,
}

/// Replace a submodel.
#[derive(Debug, Clone, PartialEq)]
pub struct PutSubmodelRequest {
    /// Replacement, matched by its id
    pub submodel: Submodel,
}

/// Delete a submodel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteSubmodelByIdRequest {
    /// Submodel id
    pub id: String,
}

/// List the top-level elements of a submodel.
#[derive(Debug, Clone, PartialEq)]
pub struct GetAllSubmodelElementsRequest {
    /// Submodel id
    pub submodel_id: String,
    /// Output view
    pub modifier: OutputModifier,
}

/// Get one submodel element.
#[derive(Debug, Clone, PartialEq)]
pub struct GetSubmodelElementByPathRequest {
    /// Element reference
    pub reference: Reference,
    /// Output view
    pub modifier: OutputModifier,
}

/// Create a submodel element below a submodel, collection or entity.
#[derive(Debug, Clone, PartialEq)]
pub struct PostSubmodelElementByPathRequest {
    /// Container reference
    pub parent: Reference,
    /// New element
    pub element: SubmodelElement,
}

/// Replace a submodel element.
#[derive(Debug, Clone, PartialEq)]
pub struct PutSubmodelElementByPathRequest {
    /// Element reference
    pub reference: Reference,
    /// Replacement
    pub element: SubmodelElement,
}

/// Set the value of a submodel element.
#[derive(Debug, Clone, PartialEq)]
pub struct SetSubmodelElementValueByPathRequest {
    /// Element reference
    pub reference: Reference,
    /// New value
    pub value: ElementValue,
}

/// Delete a submodel element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteSubmodelElementByPathRequest {
    /// Element reference
    pub reference: Reference,
}

/// Invoke an operation, synchronously or asynchronously.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeOperationRequest {
    /// Operation reference
    pub reference: Reference,
    /// Id correlating the invocation with the API request
    pub request_id: String,
    /// Input arguments
    pub input: Vec<SubmodelElement>,
    /// In-out arguments
    pub inoutput: Vec<SubmodelElement>,
}

/// Poll an asynchronous invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOperationAsyncResultRequest {
    /// Handle returned by the invocation
    pub handle_id: String,
}

/// Get one shell.
#[derive(Debug, Clone, PartialEq)]
pub struct GetAssetAdministrationShellByIdRequest {
    /// Shell id
    pub id: String,
    /// Output view
    pub modifier: OutputModifier,
}

/// Any request the service handles.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// See [`GetAllSubmodelsRequest`]
    GetAllSubmodels(GetAllSubmodelsRequest),
    /// See [`GetAllSubmodelsBySemanticIdRequest`]
    GetAllSubmodelsBySemanticId(GetAllSubmodelsBySemanticIdRequest),
    /// See [`GetSubmodelByIdRequest`]
    GetSubmodelById(GetSubmodelByIdRequest),
    /// See [`PostSubmodelRequest`]
    PostSubmodel(PostSubmodelRequest),
    /// See [`PutSubmodelRequest`]
    PutSubmodel(PutSubmodelRequest),
    /// See [`DeleteSubmodelByIdRequest`]
    DeleteSubmodelById(DeleteSubmodelByIdRequest),
    /// See [`GetAllSubmodelElementsRequest`]
    GetAllSubmodelElements(GetAllSubmodelElementsRequest),
    /// See [`GetSubmodelElementByPathRequest`]
    GetSubmodelElementByPath(GetSubmodelElementByPathRequest),
    /// See [`PostSubmodelElementByPathRequest`]
    PostSubmodelElementByPath(PostSubmodelElementByPathRequest),
    /// See [`PutSubmodelElementByPathRequest`]
    PutSubmodelElementByPath(PutSubmodelElementByPathRequest),
    /// See [`SetSubmodelElementValueByPathRequest`]
    SetSubmodelElementValueByPath(SetSubmodelElementValueByPathRequest),
    /// See [`DeleteSubmodelElementByPathRequest`]
    DeleteSubmodelElementByPath(DeleteSubmodelElementByPathRequest),
    /// Synchronous [`InvokeOperationRequest`]
    InvokeOperationSync(InvokeOperationRequest),
    /// Asynchronous [`InvokeOperationRequest`]
    InvokeOperationAsync(InvokeOperationRequest),
    /// See [`GetOperationAsyncResultRequest`]
    GetOperationAsyncResult(GetOperationAsyncResultRequest),
    /// See [`GetAssetAdministrationShellByIdRequest`]
    GetAssetAdministrationShellById(GetAssetAdministrationShellByIdRequest),
}

/// Routes every [`Request`] to its handler.
#[derive(Clone)]
pub struct RequestHandlerManager {
    context: RequestContext,
}

impl RequestHandlerManager {
    /// Dispatch through `context`.
    #[must_use]
    pub fn new(context: RequestContext) -> Self {
        Self { context }
    }

    /// The shared handler context.
    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Handle `request`. Never fails; errors become status codes.
    pub async fn execute(&self, request: Request) -> Response<ResponsePayload> {
        let ctx = &self.context;
        match request {
            Request::GetAllSubmodels(r) => GetAllSubmodelsHandler
                .process(ctx, r)
                .await
                .map(ResponsePayload::Submodels),
            Request::GetAllSubmodelsBySemanticId(r) => GetAllSubmodelsBySemanticIdHandler
                .process(ctx, r)
                .await
                .map(ResponsePayload::Submodels),
            Request::GetSubmodelById(r) => GetSubmodelByIdHandler
                .process(ctx, r)
                .await
                .map(ResponsePayload::Submodel),
            Request::PostSubmodel(r) => PostSubmodelHandler
                .process(ctx, r)
                .await
                .map(ResponsePayload::Submodel),
            Request::PutSubmodel(r) => PutSubmodelHandler
                .process(ctx, r)
                .await
                .map(ResponsePayload::Submodel),
            Request::DeleteSubmodelById(r) => DeleteSubmodelByIdHandler
                .process(ctx, r)
                .await
                .map(|()| ResponsePayload::Empty),
            Request::GetAllSubmodelElements(r) => GetAllSubmodelElementsHandler
                .process(ctx, r)
                .await
                .map(ResponsePayload::SubmodelElements),
            Request::GetSubmodelElementByPath(r) => GetSubmodelElementByPathHandler
                .process(ctx, r)
                .await
                .map(ResponsePayload::SubmodelElement),
            Request::PostSubmodelElementByPath(r) => PostSubmodelElementByPathHandler
                .process(ctx, r)
                .await
                .map(ResponsePayload::SubmodelElement),
            Request::PutSubmodelElementByPath(r) => PutSubmodelElementByPathHandler
                .process(ctx, r)
                .await
                .map(ResponsePayload::SubmodelElement),
            Request::SetSubmodelElementValueByPath(r) => SetSubmodelElementValueByPathHandler
                .process(ctx, r)
                .await
                .map(|()| ResponsePayload::Empty),
            Request::DeleteSubmodelElementByPath(r) => DeleteSubmodelElementByPathHandler
                .process(ctx, r)
                .await
                .map(|()| ResponsePayload::Empty),
            Request::InvokeOperationSync(r) => InvokeOperationSyncHandler
                .process(ctx, r)
                .await
                .map(ResponsePayload::OperationResult),
            Request::InvokeOperationAsync(r) => InvokeOperationAsyncHandler
                .process(ctx, r)
                .await
                .map(ResponsePayload::OperationHandle),
            Request::GetOperationAsyncResult(r) => GetOperationAsyncResultHandler
                .process(ctx, r)
                .await
                .map(ResponsePayload::OperationResult),
            Request::GetAssetAdministrationShellById(r) => GetAssetAdministrationShellByIdHandler
                .process(ctx, r)
                .await
                .map(ResponsePayload::Shell),
        }
    }
}
