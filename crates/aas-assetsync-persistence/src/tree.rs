//! Tree edits shared by the store implementations.

use crate::persistence::PersistenceError;
use aas_assetsync_core::{Key, KeyType, Referable, Reference, Submodel, SubmodelElement};

/// Where a referable lives.
pub(crate) enum Target<'a> {
    Shell(&'a str),
    Submodel(&'a str),
    Element {
        submodel_id: &'a str,
        path: &'a [Key],
    },
}

pub(crate) fn target(reference: &Reference) -> Result<Target<'_>, PersistenceError> {
    let (first, path) = reference
        .keys()
        .split_first()
        .ok_or_else(|| PersistenceError::NotFound(reference.to_string()))?;
    match (first.key_type, path.is_empty()) {
        (KeyType::AssetAdministrationShell, true) => Ok(Target::Shell(&first.value)),
        (KeyType::Submodel, true) => Ok(Target::Submodel(&first.value)),
        (KeyType::Submodel, false) => Ok(Target::Element {
            submodel_id: &first.value,
            path,
        }),
        _ => Err(PersistenceError::NotFound(reference.to_string())),
    }
}

pub(crate) fn not_found(reference: &Reference) -> PersistenceError {
    PersistenceError::NotFound(reference.to_string())
}

/// Check that an identifiable matches the reference it is stored under.
pub(crate) fn check_identifiable(
    reference: &Reference,
    referable: &Referable,
) -> Result<(), PersistenceError> {
    let id = reference.identifiable_id();
    let fits = reference.is_identifiable()
        && match (reference.first().key_type, referable) {
            (KeyType::AssetAdministrationShell, Referable::Shell(shell)) => shell.id == id,
            (KeyType::Submodel, Referable::Submodel(submodel)) => submodel.id == id,
            _ => false,
        };
    if fits {
        Ok(())
    } else {
        Err(PersistenceError::InvalidElement(format!(
            "{:?} does not fit {reference}",
            referable.key_type()
        )))
    }
}

/// Insert or replace an element inside `submodel`.
pub(crate) fn put_element(
    submodel: &mut Submodel,
    parent: Option<&Reference>,
    reference: &Reference,
    element: SubmodelElement,
) -> Result<SubmodelElement, PersistenceError> {
    let last = reference.last();
    if element.id_short != last.value || element.key_type() != last.key_type {
        return Err(PersistenceError::InvalidElement(format!(
            "{} ({}) does not fit {reference}",
            element.id_short,
            element.key_type()
        )));
    }
    let expected_parent = reference.parent().ok_or_else(|| not_found(reference))?;
    if let Some(parent) = parent {
        if *parent != expected_parent {
            return Err(PersistenceError::InvalidElement(format!(
                "{reference} is not a child of {parent}"
            )));
        }
    }

    let parent_path = &expected_parent.keys()[1..];
    if !submodel.upsert_element(parent_path, element.clone()) {
        return Err(not_found(&expected_parent));
    }
    Ok(element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aas_assetsync_core::TypedValue;

    #[test]
    fn element_must_fit_reference() {
        let mut submodel = Submodel::new("urn:sm");
        let reference = Reference::submodel("urn:sm").child(KeyType::Property, "A");

        let wrong_name = SubmodelElement::property("B", TypedValue::Integer(1));
        assert!(matches!(
            put_element(&mut submodel, None, &reference, wrong_name),
            Err(PersistenceError::InvalidElement(_))
        ));

        let element = SubmodelElement::property("A", TypedValue::Integer(1));
        put_element(&mut submodel, None, &reference, element).unwrap();
        assert_eq!(submodel.submodel_elements.len(), 1);
    }

    #[test]
    fn missing_parent_is_not_found() {
        let mut submodel = Submodel::new("urn:sm");
        let reference = Reference::submodel("urn:sm")
            .child(KeyType::SubmodelElementCollection, "Missing")
            .child(KeyType::Property, "A");
        let element = SubmodelElement::property("A", TypedValue::Integer(1));
        assert!(matches!(
            put_element(&mut submodel, None, &reference, element),
            Err(PersistenceError::NotFound(_))
        ));
    }
}
