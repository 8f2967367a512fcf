//! In-memory store.

use crate::modifier::OutputModifier;
use crate::persistence::{new_handle, Persistence, PersistenceError};
use crate::tree::{check_identifiable, not_found, put_element, target, Target};
use aas_assetsync_core::{
    Environment, OperationHandle, OperationResult, Referable, Reference, Submodel, SubmodelElement,
};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Store keeping the environment and operation results in memory.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    environment: RwLock<Environment>,
    operations: RwLock<HashMap<String, OperationResult>>,
}

impl MemoryPersistence {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `environment`.
    #[must_use]
    pub fn with_environment(environment: Environment) -> Self {
        Self {
            environment: RwLock::new(environment),
            operations: RwLock::default(),
        }
    }
}

impl Persistence for MemoryPersistence {
    fn get(
        &self,
        reference: &Reference,
        modifier: &OutputModifier,
    ) -> Result<Referable, PersistenceError> {
        let referable = self
            .environment
            .read()
            .resolve(reference)
            .ok_or_else(|| not_found(reference))?;
        Ok(modifier.apply(referable))
    }

    fn get_all_submodels(
        &self,
        modifier: &OutputModifier,
    ) -> Result<Vec<Submodel>, PersistenceError> {
        let mut submodels = self.environment.read().submodels.clone();
        for submodel in &mut submodels {
            modifier.apply_children(&mut submodel.submodel_elements);
        }
        Ok(submodels)
    }

    fn get_submodel_elements(
        &self,
        parent: &Reference,
        modifier: &OutputModifier,
    ) -> Result<Vec<SubmodelElement>, PersistenceError> {
        let mut children = self
            .environment
            .read()
            .children(parent)
            .ok_or_else(|| not_found(parent))?
            .to_vec();
        modifier.apply_children(&mut children);
        Ok(children)
    }

    fn put(
        &self,
        parent: Option<&Reference>,
        reference: &Reference,
        element: Referable,
    ) -> Result<Referable, PersistenceError> {
        let mut environment = self.environment.write();
        match (target(reference)?, element) {
            (Target::Element { submodel_id, .. }, Referable::SubmodelElement(element)) => {
                let submodel = environment
                    .submodel_mut(submodel_id)
                    .ok_or_else(|| not_found(&Reference::submodel(submodel_id)))?;
                put_element(submodel, parent, reference, element).map(Referable::SubmodelElement)
            }
            (Target::Element { .. }, other) => Err(PersistenceError::InvalidElement(format!(
                "{:?} cannot be stored below a submodel",
                other.key_type()
            ))),
            (_, referable) => {
                check_identifiable(reference, &referable)?;
                match &referable {
                    Referable::Shell(shell) => {
                        match environment.shells.iter_mut().find(|s| s.id == shell.id) {
                            Some(existing) => *existing = shell.clone(),
                            None => environment.shells.push(shell.clone()),
                        }
                    }
                    Referable::Submodel(submodel) => {
                        match environment.submodel_mut(&submodel.id) {
                            Some(existing) => *existing = submodel.clone(),
                            None => environment.submodels.push(submodel.clone()),
                        }
                    }
                    Referable::SubmodelElement(element) => {
                        return Err(PersistenceError::InvalidElement(format!(
                            "{} is not an identifiable",
                            element.id_short
                        )))
                    }
                }
                Ok(referable)
            }
        }
    }

    fn remove(&self, reference: &Reference) -> Result<Referable, PersistenceError> {
        let mut environment = self.environment.write();
        match target(reference)? {
            Target::Shell(id) => {
                let index = environment
                    .shells
                    .iter()
                    .position(|s| s.id == id)
                    .ok_or_else(|| not_found(reference))?;
                Ok(Referable::Shell(environment.shells.remove(index)))
            }
            Target::Submodel(id) => {
                let index = environment
                    .submodels
                    .iter()
                    .position(|s| s.id == id)
                    .ok_or_else(|| not_found(reference))?;
                Ok(Referable::Submodel(environment.submodels.remove(index)))
            }
            Target::Element { submodel_id, path } => environment
                .submodel_mut(submodel_id)
                .and_then(|submodel| submodel.remove_element(path))
                .map(Referable::SubmodelElement)
                .ok_or_else(|| not_found(reference)),
        }
    }

    fn get_operation_result(&self, handle_id: &str) -> Result<OperationResult, PersistenceError> {
        self.operations
            .read()
            .get(handle_id)
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound(format!("operation handle {handle_id}")))
    }

    fn put_operation_context(
        &self,
        handle_id: Option<&str>,
        request_id: &str,
        result: OperationResult,
    ) -> Result<OperationHandle, PersistenceError> {
        let handle = new_handle(handle_id, request_id);
        self.operations
            .write()
            .insert(handle.handle_id.clone(), result);
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aas_assetsync_core::{ExecutionState, KeyType, TypedValue};

    fn store() -> MemoryPersistence {
        let mut submodel = Submodel::new("urn:sm");
        submodel.submodel_elements = vec![SubmodelElement::property(
            "Temperature",
            TypedValue::Double(3.3),
        )];
        MemoryPersistence::with_environment(Environment {
            shells: vec![],
            submodels: vec![submodel],
        })
    }

    #[test]
    fn unknown_reference_is_not_found() {
        let store = store();
        let reference = Reference::submodel("urn:sm").child(KeyType::Property, "Missing");
        assert!(matches!(
            store.get(&reference, &OutputModifier::DEFAULT),
            Err(PersistenceError::NotFound(_))
        ));
        assert!(matches!(
            store.remove(&reference),
            Err(PersistenceError::NotFound(_))
        ));
    }

    #[test]
    fn put_then_get() {
        let store = store();
        let reference = Reference::submodel("urn:sm").child(KeyType::Property, "Temperature");
        let element = SubmodelElement::property("Temperature", TypedValue::Double(4.4));
        store.put(None, &reference, element.clone().into()).unwrap();

        let stored = store.get(&reference, &OutputModifier::DEFAULT).unwrap();
        assert_eq!(stored, Referable::SubmodelElement(element));
    }

    #[test]
    fn submodel_must_match_its_reference() {
        let store = store();
        let result = store.put(
            None,
            &Reference::submodel("urn:other"),
            Submodel::new("urn:sm").into(),
        );
        assert!(matches!(result, Err(PersistenceError::InvalidElement(_))));
    }

    #[test]
    fn operation_handles_are_fresh() {
        let store = store();
        let first = store
            .put_operation_context(None, "req", OperationResult::running("req", vec![]))
            .unwrap();
        let second = store
            .put_operation_context(None, "req", OperationResult::running("req", vec![]))
            .unwrap();
        assert_ne!(first.handle_id, second.handle_id);

        let mut result = store.get_operation_result(&first.handle_id).unwrap();
        result.fail("boom").unwrap();
        store
            .put_operation_context(Some(&first.handle_id), "req", result)
            .unwrap();
        assert_eq!(
            store
                .get_operation_result(&first.handle_id)
                .unwrap()
                .execution_state,
            ExecutionState::Failed
        );
        assert_eq!(
            store
                .get_operation_result(&second.handle_id)
                .unwrap()
                .execution_state,
            ExecutionState::Running
        );
    }
}
