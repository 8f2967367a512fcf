//! # AAS-AssetSync Service
//!
//! Request processing and asset synchronization.
//!
//! This crate provides:
//! - The [`MessageBus`] carrying [`EventMessage`](aas_assetsync_core::EventMessage)s
//! - Protocol-neutral [`Request`]s, [`Response`]s and their [`RequestHandler`]s
//! - Read-through, write-through and recursive synchronization in [`RequestContext`]
//! - The asynchronous [`OperationRegistry`]
//! - The [`Service`] facade tying it together

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod handler;
pub mod locks;
pub mod messagebus;
pub mod operation;
pub mod request;
pub mod response;
pub mod service;
pub mod sync;

pub use context::{PersistenceServiceContext, RequestContext, ValueUpdate};
pub use error::ServiceError;
pub use handler::RequestHandler;
pub use locks::KeyedLocks;
pub use messagebus::{MessageBus, MessageBusError, SubscriptionId, SubscriptionInfo};
pub use operation::OperationRegistry;
pub use request::{
    DeleteSubmodelByIdRequest, DeleteSubmodelElementByPathRequest,
    GetAllSubmodelElementsRequest, GetAllSubmodelsBySemanticIdRequest, GetAllSubmodelsRequest,
    GetAssetAdministrationShellByIdRequest, GetOperationAsyncResultRequest,
    GetSubmodelByIdRequest, GetSubmodelElementByPathRequest, InvokeOperationRequest,
    PostSubmodelElementByPathRequest, PostSubmodelRequest, PutSubmodelElementByPathRequest,
    PutSubmodelRequest, Request, RequestHandlerManager, SetSubmodelElementValueByPathRequest,
};
pub use response::{Response, ResponsePayload, StatusCode};
pub use service::{CoreConfig, Service};
pub use sync::run_subscription_pump;
