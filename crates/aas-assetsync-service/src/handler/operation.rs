//! Operation handlers.

use super::{provider_lookup, require_element_reference, RequestHandler};
use crate::context::RequestContext;
use crate::error::ServiceError;
use crate::request::{GetOperationAsyncResultRequest, InvokeOperationRequest};
use aas_assetsync_assetconnection::AssetOperationProvider;
use aas_assetsync_core::{ElementContent, OperationHandle, OperationResult, Reference};
use aas_assetsync_persistence::OutputModifier;
use async_trait::async_trait;
use std::sync::Arc;

/// Resolve the operation element and its provider.
///
/// Fails before anything is stored or published, so no handle is ever issued
/// for an operation that cannot run.
fn resolve_operation(
    ctx: &RequestContext,
    reference: &Reference,
) -> Result<Arc<dyn AssetOperationProvider>, ServiceError> {
    require_element_reference(reference)?;
    let stored = ctx
        .persistence()
        .get(reference, &OutputModifier::DEFAULT)?;
    let is_operation = matches!(
        stored.as_submodel_element().map(|e| &e.content),
        Some(ElementContent::Operation { .. })
    );
    if !is_operation {
        return Err(ServiceError::BadRequest(format!("{reference} is not an operation")));
    }
    ctx.asset_connections()
        .get_operation_provider(reference)
        .map_err(provider_lookup)
}

/// Handles [`InvokeOperationRequest`] by waiting for the provider.
pub struct InvokeOperationSyncHandler;

#[async_trait]
impl RequestHandler for InvokeOperationSyncHandler {
    type Request = InvokeOperationRequest;
    type Payload = OperationResult;

    async fn handle(
        &self,
        ctx: &RequestContext,
        request: Self::Request,
    ) -> Result<Self::Payload, ServiceError> {
        let reference = request.reference;
        let provider = resolve_operation(ctx, &reference)?;
        ctx.publish_operation_invoke(&reference, request.input.clone(), request.inoutput.clone());

        let outcome = provider.invoke(&request.input, &request.inoutput).await;
        match outcome {
            Ok(output) => {
                let mut result = OperationResult::running(&request.request_id, request.inoutput);
                result.complete(output.output, output.inoutput)?;
                ctx.publish_operation_finish(
                    &reference,
                    result.output_arguments.clone(),
                    result.inoutput_arguments.clone(),
                );
                Ok(result)
            }
            Err(err) => {
                ctx.publish_operation_finish(&reference, Vec::new(), request.inoutput);
                Err(err.into())
            }
        }
    }
}

/// Handles [`InvokeOperationRequest`] by returning a handle immediately.
pub struct InvokeOperationAsyncHandler;

#[async_trait]
impl RequestHandler for InvokeOperationAsyncHandler {
    type Request = InvokeOperationRequest;
    type Payload = OperationHandle;

    async fn handle(
        &self,
        ctx: &RequestContext,
        request: Self::Request,
    ) -> Result<Self::Payload, ServiceError> {
        let provider = resolve_operation(ctx, &request.reference)?;
        ctx.operations().invoke(
            &request.reference,
            provider,
            &request.request_id,
            request.input,
            request.inoutput,
        )
    }
}

/// Handles [`GetOperationAsyncResultRequest`].
pub struct GetOperationAsyncResultHandler;

#[async_trait]
impl RequestHandler for GetOperationAsyncResultHandler {
    type Request = GetOperationAsyncResultRequest;
    type Payload = OperationResult;

    async fn handle(
        &self,
        ctx: &RequestContext,
        request: Self::Request,
    ) -> Result<Self::Payload, ServiceError> {
        ctx.operations().result(&request.handle_id)
    }
}
