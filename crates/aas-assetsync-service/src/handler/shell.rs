//! Shell handlers.

use super::RequestHandler;
use crate::context::RequestContext;
use crate::error::ServiceError;
use crate::request::GetAssetAdministrationShellByIdRequest;
use aas_assetsync_core::{AssetAdministrationShell, Reference};
use async_trait::async_trait;

/// Handles [`GetAssetAdministrationShellByIdRequest`].
pub struct GetAssetAdministrationShellByIdHandler;

#[async_trait]
impl RequestHandler for GetAssetAdministrationShellByIdHandler {
    type Request = GetAssetAdministrationShellByIdRequest;
    type Payload = AssetAdministrationShell;

    async fn handle(
        &self,
        ctx: &RequestContext,
        request: Self::Request,
    ) -> Result<Self::Payload, ServiceError> {
        let reference = Reference::shell(request.id);
        let stored = ctx.persistence().get(&reference, &request.modifier)?;
        ctx.publish_element_read(&reference, stored.clone());
        stored
            .into_shell()
            .ok_or_else(|| ServiceError::BadRequest(format!("{reference} is not a shell")))
    }
}
