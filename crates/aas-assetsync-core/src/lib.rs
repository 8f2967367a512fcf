//! # AAS-AssetSync Core
//!
//! Shared model types for the AAS-AssetSync engine.
//!
//! This crate provides:
//! - [`Reference`] addressing for shells, submodels and nested elements
//! - A typed element tree ([`Environment`], [`Submodel`], [`SubmodelElement`])
//! - Protocol-neutral [`ElementValue`] projections with a value-only JSON mapping
//! - Async operation bookkeeping ([`OperationHandle`], [`OperationResult`])
//! - The [`EventMessage`] taxonomy published on the message bus

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod event;
pub mod format;
pub mod model;
pub mod operation;
pub mod reference;
pub mod value;

pub use event::{EventKind, EventMessage};
pub use model::{
    AssetAdministrationShell, ElementContent, EntityType, Environment, LangString, Referable,
    Submodel, SubmodelElement,
};
pub use operation::{ExecutionState, OperationHandle, OperationResult, OperationStateError};
pub use reference::{Key, KeyType, Reference, ReferenceError};
pub use value::{DataType, ElementValue, TypeInfo, TypedValue, ValueMappingError};
