//! The store contract.

use crate::modifier::OutputModifier;
use aas_assetsync_core::{OperationHandle, OperationResult, Referable, Reference, Submodel, SubmodelElement};

/// A persisted model store.
///
/// Every call is atomic with respect to other calls on the same store, so a
/// `get` followed by a `put` only races with writers that do not hold the
/// caller's per-reference lock.
pub trait Persistence: Send + Sync {
    /// Get the referable addressed by `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] if the reference does not resolve.
    fn get(
        &self,
        reference: &Reference,
        modifier: &OutputModifier,
    ) -> Result<Referable, PersistenceError>;

    /// Get every submodel.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read.
    fn get_all_submodels(&self, modifier: &OutputModifier)
        -> Result<Vec<Submodel>, PersistenceError>;

    /// Get the child elements of a submodel, collection or entity.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] if `parent` does not resolve to a container.
    fn get_submodel_elements(
        &self,
        parent: &Reference,
        modifier: &OutputModifier,
    ) -> Result<Vec<SubmodelElement>, PersistenceError>;

    /// Insert or replace `element` at `reference` below `parent`.
    ///
    /// `parent` defaults to the parent of `reference` and is ignored for identifiables.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] if the parent does not exist, or
    /// [`PersistenceError::InvalidElement`] if `element` does not fit `reference`.
    fn put(
        &self,
        parent: Option<&Reference>,
        reference: &Reference,
        element: Referable,
    ) -> Result<Referable, PersistenceError>;

    /// Remove the referable at `reference`, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] if the reference does not resolve.
    fn remove(&self, reference: &Reference) -> Result<Referable, PersistenceError>;

    /// Get the result of an asynchronous invocation.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] for unknown handles.
    fn get_operation_result(&self, handle_id: &str) -> Result<OperationResult, PersistenceError>;

    /// Store an operation result, allocating a fresh handle when `handle_id` is `None`.
    ///
    /// # Errors
    ///
    /// Returns error if the result cannot be stored.
    fn put_operation_context(
        &self,
        handle_id: Option<&str>,
        request_id: &str,
        result: OperationResult,
    ) -> Result<OperationHandle, PersistenceError>;
}

pub(crate) fn new_handle(handle_id: Option<&str>, request_id: &str) -> OperationHandle {
    OperationHandle {
        request_id: request_id.to_string(),
        handle_id: handle_id.map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_string),
    }
}

/// Errors that can occur accessing the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
    /// Reference or handle does not resolve
    #[error("resource not found: {0}")]
    NotFound(String),
    /// Element does not fit the target reference
    #[error("invalid element: {0}")]
    InvalidElement(String),
    /// Storage engine failure
    #[error("storage error: {0}")]
    Storage(String),
    /// Payload could not be encoded or decoded
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        PersistenceError::Storage(err.to_string())
    }
}
