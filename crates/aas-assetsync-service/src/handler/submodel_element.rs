//! Submodel element handlers.
//!
//! Reads refresh the stored value from the asset first. Writes hit the store
//! first and the asset second, and every event is published after the store
//! write it announces. Writes keep the reference locked until their events
//! are out, so the asset and the bus see them in store order.

use super::{require_element_reference, RequestHandler};
use crate::context::RequestContext;
use crate::error::ServiceError;
use crate::request::{
    DeleteSubmodelElementByPathRequest, GetAllSubmodelElementsRequest,
    GetSubmodelElementByPathRequest, PostSubmodelElementByPathRequest,
    PutSubmodelElementByPathRequest, SetSubmodelElementValueByPathRequest,
};
use crate::response::StatusCode;
use aas_assetsync_core::{KeyType, Referable, Reference, SubmodelElement};
use aas_assetsync_persistence::{OutputModifier, PersistenceError};
use async_trait::async_trait;

fn into_element(referable: Referable, reference: &Reference) -> Result<SubmodelElement, ServiceError> {
    referable
        .into_submodel_element()
        .ok_or_else(|| ServiceError::BadRequest(format!("{reference} is not a submodel element")))
}

fn stored_element(ctx: &RequestContext, reference: &Reference) -> Result<SubmodelElement, ServiceError> {
    let stored = ctx
        .persistence()
        .get(reference, &OutputModifier::DEFAULT)?;
    into_element(stored, reference)
}

/// Write the value of a freshly stored element through to its asset.
///
/// Skipped when `previous` already carried the same value.
async fn write_through(
    ctx: &RequestContext,
    reference: &Reference,
    previous: Option<&SubmodelElement>,
    element: &SubmodelElement,
) -> Result<(), ServiceError> {
    if !ctx.asset_connections().has_value_provider(reference) {
        return Ok(());
    }
    let value = element.to_value()?;
    if previous.and_then(|p| p.to_value().ok()).as_ref() == Some(&value) {
        tracing::debug!(reference = %reference, "Value unchanged, skipping asset write");
        return Ok(());
    }
    ctx.write_value_to_asset(reference, &value).await?;
    Ok(())
}

/// Handles [`GetAllSubmodelElementsRequest`].
pub struct GetAllSubmodelElementsHandler;

#[async_trait]
impl RequestHandler for GetAllSubmodelElementsHandler {
    type Request = GetAllSubmodelElementsRequest;
    type Payload = Vec<SubmodelElement>;

    async fn handle(
        &self,
        ctx: &RequestContext,
        request: Self::Request,
    ) -> Result<Self::Payload, ServiceError> {
        let parent = Reference::submodel(request.submodel_id);
        let mut elements = ctx
            .persistence()
            .get_submodel_elements(&parent, &OutputModifier::DEFAULT)?;
        ctx.sync_elements(&parent, &mut elements).await?;

        for element in &elements {
            let reference = parent.child(element.key_type(), element.id_short.clone());
            ctx.publish_element_read(&reference, element.clone().into());
        }
        request.modifier.apply_children(&mut elements);
        Ok(elements)
    }
}

/// Handles [`GetSubmodelElementByPathRequest`].
pub struct GetSubmodelElementByPathHandler;

#[async_trait]
impl RequestHandler for GetSubmodelElementByPathHandler {
    type Request = GetSubmodelElementByPathRequest;
    type Payload = SubmodelElement;

    async fn handle(
        &self,
        ctx: &RequestContext,
        request: Self::Request,
    ) -> Result<Self::Payload, ServiceError> {
        let reference = request.reference;
        require_element_reference(&reference)?;
        let mut element = stored_element(ctx, &reference)?;

        // A provider on the element itself wins over providers on its children
        if let Some(value) = ctx.read_value_from_asset(&reference).await? {
            if let Some(update) = ctx.apply_asset_value(&reference, value).await? {
                tracing::debug!(reference = %reference, "Read-through updated stored value");
                element = update.element;
                ctx.publish_element_update(&reference, element.clone().into());
            }
        } else if let Some(children) = element.children_mut() {
            ctx.sync_elements(&reference, children).await?;
        }

        ctx.publish_element_read(&reference, element.clone().into());
        into_element(request.modifier.apply(element.into()), &reference)
    }
}

/// Handles [`PostSubmodelElementByPathRequest`].
pub struct PostSubmodelElementByPathHandler;

#[async_trait]
impl RequestHandler for PostSubmodelElementByPathHandler {
    type Request = PostSubmodelElementByPathRequest;
    type Payload = SubmodelElement;
    const SUCCESS: StatusCode = StatusCode::SuccessCreated;

    async fn handle(
        &self,
        ctx: &RequestContext,
        request: Self::Request,
    ) -> Result<Self::Payload, ServiceError> {
        let parent = request.parent;
        if parent.first().key_type != KeyType::Submodel {
            return Err(ServiceError::BadRequest(format!(
                "{parent} is not a submodel or a submodel element"
            )));
        }
        let reference = parent.child(request.element.key_type(), request.element.id_short.clone());
        let _guard = ctx.locks().lock(&reference).await;
        match ctx.persistence().get(&reference, &OutputModifier::DEFAULT) {
            Ok(_) => {
                return Err(ServiceError::Conflict(format!("{reference} already exists")));
            }
            Err(PersistenceError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }
        let stored = ctx
            .persistence()
            .put(Some(&parent), &reference, request.element.into())?;
        let element = into_element(stored, &reference)?;

        write_through(ctx, &reference, None, &element).await?;
        ctx.publish_element_create(&reference, element.clone().into());
        Ok(element)
    }
}

/// Handles [`PutSubmodelElementByPathRequest`].
pub struct PutSubmodelElementByPathHandler;

#[async_trait]
impl RequestHandler for PutSubmodelElementByPathHandler {
    type Request = PutSubmodelElementByPathRequest;
    type Payload = SubmodelElement;

    async fn handle(
        &self,
        ctx: &RequestContext,
        request: Self::Request,
    ) -> Result<Self::Payload, ServiceError> {
        let reference = request.reference;
        require_element_reference(&reference)?;
        let _guard = ctx.locks().lock(&reference).await;
        let previous = stored_element(ctx, &reference)?;
        let stored = ctx
            .persistence()
            .put(reference.parent().as_ref(), &reference, request.element.into())?;
        let element = into_element(stored, &reference)?;

        write_through(ctx, &reference, Some(&previous), &element).await?;
        ctx.publish_element_update(&reference, element.clone().into());
        Ok(element)
    }
}

/// Handles [`SetSubmodelElementValueByPathRequest`].
pub struct SetSubmodelElementValueByPathHandler;

#[async_trait]
impl RequestHandler for SetSubmodelElementValueByPathHandler {
    type Request = SetSubmodelElementValueByPathRequest;
    type Payload = ();
    const SUCCESS: StatusCode = StatusCode::SuccessNoContent;

    async fn handle(
        &self,
        ctx: &RequestContext,
        request: Self::Request,
    ) -> Result<Self::Payload, ServiceError> {
        let reference = request.reference;
        require_element_reference(&reference)?;
        let _guard = ctx.locks().lock(&reference).await;
        let mut element = stored_element(ctx, &reference)?;
        let old_value = element.to_value()?;
        element.set_value(request.value.clone())?;
        let stored = ctx
            .persistence()
            .put(reference.parent().as_ref(), &reference, element.into())?;
        let element = into_element(stored, &reference)?;

        if old_value == request.value {
            tracing::debug!(reference = %reference, "Value unchanged, skipping asset write");
        } else {
            ctx.write_value_to_asset(&reference, &request.value).await?;
        }
        ctx.publish_value_change(&reference, Some(old_value), request.value);
        ctx.publish_element_update(&reference, element.into());
        Ok(())
    }
}

/// Handles [`DeleteSubmodelElementByPathRequest`].
pub struct DeleteSubmodelElementByPathHandler;

#[async_trait]
impl RequestHandler for DeleteSubmodelElementByPathHandler {
    type Request = DeleteSubmodelElementByPathRequest;
    type Payload = ();
    const SUCCESS: StatusCode = StatusCode::SuccessNoContent;

    async fn handle(
        &self,
        ctx: &RequestContext,
        request: Self::Request,
    ) -> Result<Self::Payload, ServiceError> {
        let reference = request.reference;
        require_element_reference(&reference)?;
        let _guard = ctx.locks().lock(&reference).await;
        let removed = ctx.persistence().remove(&reference)?;
        ctx.publish_element_delete(&reference, removed);
        Ok(())
    }
}
