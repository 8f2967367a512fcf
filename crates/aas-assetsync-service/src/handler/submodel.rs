//! Submodel handlers.

use super::RequestHandler;
use crate::context::RequestContext;
use crate::error::ServiceError;
use crate::request::{
    DeleteSubmodelByIdRequest, GetAllSubmodelsBySemanticIdRequest, GetAllSubmodelsRequest,
    GetSubmodelByIdRequest, PostSubmodelRequest, PutSubmodelRequest,
};
use crate::response::StatusCode;
use aas_assetsync_core::{Referable, Reference, Submodel};
use aas_assetsync_persistence::{OutputModifier, PersistenceError};
use async_trait::async_trait;

fn into_submodel(referable: Referable, reference: &Reference) -> Result<Submodel, ServiceError> {
    referable
        .into_submodel()
        .ok_or_else(|| ServiceError::BadRequest(format!("{reference} is not a submodel")))
}

/// Synchronize a submodel with its assets, announce the read and apply the view.
async fn read_submodel(
    ctx: &RequestContext,
    mut submodel: Submodel,
    modifier: &OutputModifier,
) -> Result<Submodel, ServiceError> {
    let reference = submodel.reference();
    ctx.sync_elements(&reference, &mut submodel.submodel_elements)
        .await?;
    ctx.publish_element_read(&reference, submodel.clone().into());
    into_submodel(modifier.apply(submodel.into()), &reference)
}

async fn read_all(
    ctx: &RequestContext,
    submodels: Vec<Submodel>,
    modifier: &OutputModifier,
) -> Result<Vec<Submodel>, ServiceError> {
    let mut result = Vec::with_capacity(submodels.len());
    for submodel in submodels {
        result.push(read_submodel(ctx, submodel, modifier).await?);
    }
    Ok(result)
}

/// Handles [`GetAllSubmodelsRequest`].
pub struct GetAllSubmodelsHandler;

#[async_trait]
impl RequestHandler for GetAllSubmodelsHandler {
    type Request = GetAllSubmodelsRequest;
    type Payload = Vec<Submodel>;

    async fn handle(
        &self,
        ctx: &RequestContext,
        request: Self::Request,
    ) -> Result<Self::Payload, ServiceError> {
        let submodels = ctx
            .persistence()
            .get_all_submodels(&OutputModifier::DEFAULT)?;
        read_all(ctx, submodels, &request.modifier).await
    }
}

/// Handles [`GetAllSubmodelsBySemanticIdRequest`].
pub struct GetAllSubmodelsBySemanticIdHandler;

#[async_trait]
impl RequestHandler for GetAllSubmodelsBySemanticIdHandler {
    type Request = GetAllSubmodelsBySemanticIdRequest;
    type Payload = Vec<Submodel>;

    async fn handle(
        &self,
        ctx: &RequestContext,
        request: Self::Request,
    ) -> Result<Self::Payload, ServiceError> {
        let submodels: Vec<Submodel> = ctx
            .persistence()
            .get_all_submodels(&OutputModifier::DEFAULT)?
            .into_iter()
            .filter(|s| s.semantic_id.as_ref() == Some(&request.semantic_id))
            .collect();
        read_all(ctx, submodels, &request.modifier).await
    }
}

/// Handles [`GetSubmodelByIdRequest`].
pub struct GetSubmodelByIdHandler;

#[async_trait]
impl RequestHandler for GetSubmodelByIdHandler {
    type Request = GetSubmodelByIdRequest;
    type Payload = Submodel;

    async fn handle(
        &self,
        ctx: &RequestContext,
        request: Self::Request,
    ) -> Result<Self::Payload, ServiceError> {
        let reference = Reference::submodel(request.id);
        let stored = ctx
            .persistence()
            .get(&reference, &OutputModifier::DEFAULT)?;
        let submodel = into_submodel(stored, &reference)?;
        read_submodel(ctx, submodel, &request.modifier).await
    }
}

/// Handles [`PostSubmodelRequest`].
pub struct PostSubmodelHandler;

#[async_trait]
impl RequestHandler for PostSubmodelHandler {
    type Request = PostSubmodelRequest;
    type Payload = Submodel;
    const SUCCESS: StatusCode = StatusCode::SuccessCreated;

    async fn handle(
        &self,
        ctx: &RequestContext,
        request: Self::Request,
    ) -> Result<Self::Payload, ServiceError> {
        let reference = request.submodel.reference();
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
            .put(None, &reference, request.submodel.into())?;
        ctx.publish_element_create(&reference, stored.clone());
        into_submodel(stored, &reference)
    }
}

/// Handles [`PutSubmodelRequest`].
pub struct PutSubmodelHandler;

#[async_trait]
impl RequestHandler for PutSubmodelHandler {
    type Request = PutSubmodelRequest;
    type Payload = Submodel;

    async fn handle(
        &self,
        ctx: &RequestContext,
        request: Self::Request,
    ) -> Result<Self::Payload, ServiceError> {
        let reference = request.submodel.reference();
        let _guard = ctx.locks().lock(&reference).await;

        ctx.persistence().get(&reference, &OutputModifier::DEFAULT)?;
        let stored = ctx
            .persistence()
            .put(None, &reference, request.submodel.into())?;
        ctx.publish_element_update(&reference, stored.clone());
        into_submodel(stored, &reference)
    }
}

/// Handles [`DeleteSubmodelByIdRequest`].
pub struct DeleteSubmodelByIdHandler;

#[async_trait]
impl RequestHandler for DeleteSubmodelByIdHandler {
    type Request = DeleteSubmodelByIdRequest;
    type Payload = ();
    const SUCCESS: StatusCode = StatusCode::SuccessNoContent;

    async fn handle(
        &self,
        ctx: &RequestContext,
        request: Self::Request,
    ) -> Result<Self::Payload, ServiceError> {
        let reference = Reference::submodel(request.id);
        let _guard = ctx.locks().lock(&reference).await;

        let removed = ctx.persistence().remove(&reference)?;
        tracing::debug!(reference = %reference, "Submodel deleted");
        ctx.publish_element_delete(&reference, removed);
        Ok(())
    }
}
