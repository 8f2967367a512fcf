//! Typed element tree of an AAS environment.
//!
//! The tree is navigated with [`Reference`]s: the first key selects a shell or
//! submodel by id, every further key selects a child element by `idShort`
//! and key type.

use crate::reference::{Key, KeyType, Reference};
use crate::value::{DataType, ElementValue, TypeInfo, TypedValue, ValueMappingError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether an entity is managed by its parent asset or on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    /// Entity without its own shell
    CoManagedEntity,
    /// Entity with its own shell and global asset id
    SelfManagedEntity,
}

/// Text in one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LangString {
    /// Language code (e.g. `en`)
    pub language: String,
    /// The text
    pub text: String,
}

/// The root container of shells and submodels.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Environment {
    /// Asset administration shells
    #[serde(rename = "assetAdministrationShells", default)]
    pub shells: Vec<AssetAdministrationShell>,
    /// Submodels
    #[serde(default)]
    pub submodels: Vec<Submodel>,
}

/// An asset administration shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAdministrationShell {
    /// Globally unique id
    pub id: String,
    /// Short name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    /// Id of the described asset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_asset_id: Option<String>,
    /// References to the shell's submodels
    #[serde(default)]
    pub submodels: Vec<Reference>,
}

/// A submodel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submodel {
    /// Globally unique id
    pub id: String,
    /// Short name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    /// Semantic definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    /// Top-level elements
    #[serde(default)]
    pub submodel_elements: Vec<SubmodelElement>,
}

/// A submodel element: common attributes plus kind-specific content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmodelElement {
    /// Short name, unique among siblings
    pub id_short: String,
    /// Semantic definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    /// Kind-specific content
    #[serde(flatten)]
    pub content: ElementContent,
}

/// Kind-specific content of a [`SubmodelElement`].
///
/// Scalar values are kept in their lexical form, blob content as base64.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "modelType", rename_all_fields = "camelCase")]
pub enum ElementContent {
    /// A single-valued property
    Property {
        /// Declared data type
        value_type: DataType,
        /// Lexical value
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    /// A range with min/max values
    Range {
        /// Declared data type
        value_type: DataType,
        /// Lexical lower bound
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<String>,
        /// Lexical upper bound
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<String>,
    },
    /// A multi-language property
    MultiLanguageProperty {
        /// Texts
        #[serde(default)]
        value: Vec<LangString>,
    },
    /// A blob (binary data)
    Blob {
        /// MIME type
        content_type: String,
        /// Base64 content
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    /// A file reference
    File {
        /// MIME type
        content_type: String,
        /// Path or URI
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    /// A reference element
    ReferenceElement {
        /// Referenced element
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Reference>,
    },
    /// A relationship element
    RelationshipElement {
        /// First endpoint
        #[serde(default, skip_serializing_if = "Option::is_none")]
        first: Option<Reference>,
        /// Second endpoint
        #[serde(default, skip_serializing_if = "Option::is_none")]
        second: Option<Reference>,
    },
    /// An entity element
    Entity {
        /// Co-managed or self-managed
        entity_type: EntityType,
        /// Global asset id
        #[serde(default, skip_serializing_if = "Option::is_none")]
        global_asset_id: Option<String>,
        /// Statements about the entity
        #[serde(default)]
        statements: Vec<SubmodelElement>,
    },
    /// A submodel element collection
    SubmodelElementCollection {
        /// Child elements
        #[serde(default)]
        value: Vec<SubmodelElement>,
    },
    /// An operation element
    Operation {
        /// Input arguments
        #[serde(default)]
        input_variables: Vec<SubmodelElement>,
        /// Output arguments
        #[serde(default)]
        output_variables: Vec<SubmodelElement>,
        /// In-out arguments
        #[serde(default)]
        inoutput_variables: Vec<SubmodelElement>,
    },
    /// A capability element
    Capability,
}

impl SubmodelElement {
    /// Create an element.
    #[must_use]
    pub fn new(id_short: impl Into<String>, content: ElementContent) -> Self {
        Self {
            id_short: id_short.into(),
            semantic_id: None,
            content,
        }
    }

    /// Create a property holding `value`.
    #[must_use]
    pub fn property(id_short: impl Into<String>, value: TypedValue) -> Self {
        Self::new(
            id_short,
            ElementContent::Property {
                value_type: value.data_type(),
                value: Some(value.to_lexical()),
            },
        )
    }

    /// Create a collection of `children`.
    #[must_use]
    pub fn collection(id_short: impl Into<String>, children: Vec<SubmodelElement>) -> Self {
        Self::new(
            id_short,
            ElementContent::SubmodelElementCollection { value: children },
        )
    }

    /// Key type used to address this element.
    #[must_use]
    pub fn key_type(&self) -> KeyType {
        match &self.content {
            ElementContent::Property { .. } => KeyType::Property,
            ElementContent::Range { .. } => KeyType::Range,
            ElementContent::MultiLanguageProperty { .. } => KeyType::MultiLanguageProperty,
            ElementContent::Blob { .. } => KeyType::Blob,
            ElementContent::File { .. } => KeyType::File,
            ElementContent::ReferenceElement { .. } => KeyType::ReferenceElement,
            ElementContent::RelationshipElement { .. } => KeyType::RelationshipElement,
            ElementContent::Entity { .. } => KeyType::Entity,
            ElementContent::SubmodelElementCollection { .. } => KeyType::SubmodelElementCollection,
            ElementContent::Operation { .. } => KeyType::Operation,
            ElementContent::Capability => KeyType::Capability,
        }
    }

    /// Whether `key` addresses this element.
    #[must_use]
    pub fn matches(&self, key: &Key) -> bool {
        self.id_short == key.value && self.key_type() == key.key_type
    }

    /// Whether this element is a submodel element collection.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(self.content, ElementContent::SubmodelElementCollection { .. })
    }

    /// Child elements of collections and entities.
    #[must_use]
    pub fn children(&self) -> Option<&[SubmodelElement]> {
        match &self.content {
            ElementContent::SubmodelElementCollection { value } => Some(value),
            ElementContent::Entity { statements, .. } => Some(statements),
            _ => None,
        }
    }

    /// Mutable child elements of collections and entities.
    pub fn children_mut(&mut self) -> Option<&mut Vec<SubmodelElement>> {
        match &mut self.content {
            ElementContent::SubmodelElementCollection { value } => Some(value),
            ElementContent::Entity { statements, .. } => Some(statements),
            _ => None,
        }
    }

    /// Declared type of this element's value.
    ///
    /// # Errors
    ///
    /// Returns [`ValueMappingError::NotSupported`] for operations and capabilities.
    pub fn type_info(&self) -> Result<TypeInfo, ValueMappingError> {
        Ok(match &self.content {
            ElementContent::Property { value_type, .. } => TypeInfo::Property(*value_type),
            ElementContent::Range { value_type, .. } => TypeInfo::Range(*value_type),
            ElementContent::MultiLanguageProperty { .. } => TypeInfo::MultiLanguage,
            ElementContent::Blob { content_type, .. } => TypeInfo::Blob {
                content_type: content_type.clone(),
            },
            ElementContent::File { content_type, .. } => TypeInfo::File {
                content_type: content_type.clone(),
            },
            ElementContent::ReferenceElement { .. } => TypeInfo::Reference,
            ElementContent::RelationshipElement { .. } => TypeInfo::Relationship,
            ElementContent::Entity { statements, .. } => TypeInfo::Entity(child_types(statements)),
            ElementContent::SubmodelElementCollection { value } => {
                TypeInfo::Collection(child_types(value))
            }
            ElementContent::Operation { .. } | ElementContent::Capability => {
                return Err(self.no_value())
            }
        })
    }

    /// Current value of this element.
    ///
    /// # Errors
    ///
    /// Returns [`ValueMappingError::NotSupported`] for operations and capabilities,
    /// or [`ValueMappingError::InvalidValue`] if the stored lexical form is corrupt.
    pub fn to_value(&self) -> Result<ElementValue, ValueMappingError> {
        Ok(match &self.content {
            ElementContent::Property { value_type, value } => ElementValue::Property(
                value
                    .as_deref()
                    .map(|v| TypedValue::parse(*value_type, v))
                    .transpose()?,
            ),
            ElementContent::Range {
                value_type,
                min,
                max,
            } => ElementValue::Range {
                min: min
                    .as_deref()
                    .map(|v| TypedValue::parse(*value_type, v))
                    .transpose()?,
                max: max
                    .as_deref()
                    .map(|v| TypedValue::parse(*value_type, v))
                    .transpose()?,
            },
            ElementContent::MultiLanguageProperty { value } => ElementValue::MultiLanguage(
                value
                    .iter()
                    .map(|ls| (ls.language.clone(), ls.text.clone()))
                    .collect(),
            ),
            ElementContent::Blob {
                content_type,
                value,
            } => ElementValue::Blob {
                mime_type: content_type.clone(),
                content: match value {
                    Some(encoded) => BASE64.decode(encoded).map_err(|e| {
                        ValueMappingError::InvalidValue(format!("blob {}: {e}", self.id_short))
                    })?,
                    None => Vec::new(),
                },
            },
            ElementContent::File {
                content_type,
                value,
            } => ElementValue::File {
                content_type: content_type.clone(),
                path: value.clone(),
            },
            ElementContent::ReferenceElement { value } => ElementValue::Reference(value.clone()),
            ElementContent::RelationshipElement { first, second } => ElementValue::Relationship {
                first: first.clone(),
                second: second.clone(),
            },
            ElementContent::Entity {
                entity_type,
                global_asset_id,
                statements,
            } => ElementValue::Entity {
                entity_type: *entity_type,
                global_asset_id: global_asset_id.clone(),
                statements: child_values(statements)?,
            },
            ElementContent::SubmodelElementCollection { value } => {
                ElementValue::Collection(child_values(value)?)
            }
            ElementContent::Operation { .. } | ElementContent::Capability => {
                return Err(self.no_value())
            }
        })
    }

    /// Replace this element's value.
    ///
    /// The value variant and data type must match the element; nothing is
    /// coerced. On error the element is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ValueMappingError::TypeMismatch`] on a variant or data type mismatch.
    pub fn set_value(&mut self, value: ElementValue) -> Result<(), ValueMappingError> {
        let mut updated = self.clone();
        updated.apply_value(value)?;
        *self = updated;
        Ok(())
    }

    fn apply_value(&mut self, value: ElementValue) -> Result<(), ValueMappingError> {
        if !has_value(self) {
            return Err(self.no_value());
        }
        let key_type = self.key_type();
        let mismatch = |value: &ElementValue| ValueMappingError::TypeMismatch {
            expected: key_type.to_string(),
            actual: value.kind().to_string(),
        };

        match (&mut self.content, value) {
            (ElementContent::Property { value_type, value }, ElementValue::Property(new)) => {
                *value = lexical(*value_type, new)?;
            }
            (
                ElementContent::Range {
                    value_type,
                    min,
                    max,
                },
                ElementValue::Range {
                    min: new_min,
                    max: new_max,
                },
            ) => {
                *min = lexical(*value_type, new_min)?;
                *max = lexical(*value_type, new_max)?;
            }
            (ElementContent::MultiLanguageProperty { value }, ElementValue::MultiLanguage(texts)) => {
                *value = texts
                    .into_iter()
                    .map(|(language, text)| LangString { language, text })
                    .collect();
            }
            (
                ElementContent::Blob {
                    content_type,
                    value,
                },
                ElementValue::Blob { mime_type, content },
            ) => {
                *content_type = mime_type;
                *value = (!content.is_empty()).then(|| BASE64.encode(&content));
            }
            (
                ElementContent::File {
                    content_type,
                    value,
                },
                ElementValue::File {
                    content_type: new_type,
                    path,
                },
            ) => {
                *content_type = new_type;
                *value = path;
            }
            (ElementContent::ReferenceElement { value }, ElementValue::Reference(new)) => {
                *value = new;
            }
            (
                ElementContent::RelationshipElement { first, second },
                ElementValue::Relationship {
                    first: new_first,
                    second: new_second,
                },
            ) => {
                *first = new_first;
                *second = new_second;
            }
            (
                ElementContent::Entity {
                    entity_type,
                    global_asset_id,
                    statements,
                },
                ElementValue::Entity {
                    entity_type: new_type,
                    global_asset_id: new_id,
                    statements: new_statements,
                },
            ) => {
                *entity_type = new_type;
                *global_asset_id = new_id;
                apply_children(statements, new_statements)?;
            }
            (
                ElementContent::SubmodelElementCollection { value },
                ElementValue::Collection(children),
            ) => {
                apply_children(value, children)?;
            }
            (_, other) => return Err(mismatch(&other)),
        }
        Ok(())
    }

    fn no_value(&self) -> ValueMappingError {
        ValueMappingError::NotSupported(format!("{} ({})", self.id_short, self.key_type()))
    }
}

fn lexical(
    data_type: DataType,
    value: Option<TypedValue>,
) -> Result<Option<String>, ValueMappingError> {
    match value {
        None => Ok(None),
        Some(v) if v.data_type() == data_type => Ok(Some(v.to_lexical())),
        Some(v) => Err(ValueMappingError::TypeMismatch {
            expected: data_type.to_string(),
            actual: v.data_type().to_string(),
        }),
    }
}

fn has_value(element: &SubmodelElement) -> bool {
    !matches!(
        element.content,
        ElementContent::Operation { .. } | ElementContent::Capability
    )
}

fn child_types(children: &[SubmodelElement]) -> BTreeMap<String, TypeInfo> {
    children
        .iter()
        .filter_map(|c| Some((c.id_short.clone(), c.type_info().ok()?)))
        .collect()
}

fn child_values(
    children: &[SubmodelElement],
) -> Result<BTreeMap<String, ElementValue>, ValueMappingError> {
    children
        .iter()
        .filter(|c| has_value(c))
        .map(|c| Ok((c.id_short.clone(), c.to_value()?)))
        .collect()
}

fn apply_children(
    children: &mut [SubmodelElement],
    values: BTreeMap<String, ElementValue>,
) -> Result<(), ValueMappingError> {
    for (id_short, value) in values {
        let child = children
            .iter_mut()
            .find(|c| c.id_short == id_short)
            .ok_or_else(|| ValueMappingError::InvalidValue(format!("unknown child element {id_short}")))?;
        child.apply_value(value)?;
    }
    Ok(())
}

/// Anything a [`Reference`] can point to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Referable {
    /// An asset administration shell
    Shell(AssetAdministrationShell),
    /// A submodel
    Submodel(Submodel),
    /// A submodel element
    SubmodelElement(SubmodelElement),
}

impl Referable {
    /// Key type addressing this referable.
    #[must_use]
    pub fn key_type(&self) -> KeyType {
        match self {
            Referable::Shell(_) => KeyType::AssetAdministrationShell,
            Referable::Submodel(_) => KeyType::Submodel,
            Referable::SubmodelElement(e) => e.key_type(),
        }
    }

    /// The submodel element, if this is one.
    #[must_use]
    pub fn as_submodel_element(&self) -> Option<&SubmodelElement> {
        match self {
            Referable::SubmodelElement(e) => Some(e),
            _ => None,
        }
    }

    /// Take the submodel element, if this is one.
    #[must_use]
    pub fn into_submodel_element(self) -> Option<SubmodelElement> {
        match self {
            Referable::SubmodelElement(e) => Some(e),
            _ => None,
        }
    }

    /// Take the submodel, if this is one.
    #[must_use]
    pub fn into_submodel(self) -> Option<Submodel> {
        match self {
            Referable::Submodel(s) => Some(s),
            _ => None,
        }
    }

    /// Take the shell, if this is one.
    #[must_use]
    pub fn into_shell(self) -> Option<AssetAdministrationShell> {
        match self {
            Referable::Shell(s) => Some(s),
            _ => None,
        }
    }
}

impl From<SubmodelElement> for Referable {
    fn from(value: SubmodelElement) -> Self {
        Referable::SubmodelElement(value)
    }
}

impl From<Submodel> for Referable {
    fn from(value: Submodel) -> Self {
        Referable::Submodel(value)
    }
}

impl From<AssetAdministrationShell> for Referable {
    fn from(value: AssetAdministrationShell) -> Self {
        Referable::Shell(value)
    }
}

impl Submodel {
    /// Create an empty submodel.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            id_short: None,
            semantic_id: None,
            submodel_elements: Vec::new(),
        }
    }

    /// Reference to this submodel.
    #[must_use]
    pub fn reference(&self) -> Reference {
        Reference::submodel(&self.id)
    }

    /// Resolve a path of element keys below this submodel.
    #[must_use]
    pub fn element(&self, path: &[Key]) -> Option<&SubmodelElement> {
        let (last, parents) = path.split_last()?;
        let mut elements: &[SubmodelElement] = &self.submodel_elements;
        for key in parents {
            elements = elements.iter().find(|e| e.matches(key))?.children()?;
        }
        elements.iter().find(|e| e.matches(last))
    }

    /// Resolve a path of element keys below this submodel, mutably.
    pub fn element_mut(&mut self, path: &[Key]) -> Option<&mut SubmodelElement> {
        let (last, parents) = path.split_last()?;
        let elements = self.children_mut(parents)?;
        elements.iter_mut().find(|e| e.matches(last))
    }

    /// Child list at `path`; the empty path yields the top-level elements.
    #[must_use]
    pub fn children(&self, path: &[Key]) -> Option<&[SubmodelElement]> {
        if path.is_empty() {
            return Some(&self.submodel_elements);
        }
        self.element(path)?.children()
    }

    /// Mutable child list at `path`.
    pub fn children_mut(&mut self, path: &[Key]) -> Option<&mut Vec<SubmodelElement>> {
        let mut elements = &mut self.submodel_elements;
        for key in path {
            elements = elements.iter_mut().find(|e| e.matches(key))?.children_mut()?;
        }
        Some(elements)
    }

    /// Insert or replace `element` in the child list at `parent_path`.
    ///
    /// Returns `false` if the parent does not exist or has no children.
    pub fn upsert_element(&mut self, parent_path: &[Key], element: SubmodelElement) -> bool {
        let Some(children) = self.children_mut(parent_path) else {
            return false;
        };
        match children.iter_mut().find(|e| e.id_short == element.id_short) {
            Some(existing) => *existing = element,
            None => children.push(element),
        }
        true
    }

    /// Remove the element at `path`.
    pub fn remove_element(&mut self, path: &[Key]) -> Option<SubmodelElement> {
        let (last, parents) = path.split_last()?;
        let children = self.children_mut(parents)?;
        let index = children.iter().position(|e| e.matches(last))?;
        Some(children.remove(index))
    }
}

impl Environment {
    /// Shell by id.
    #[must_use]
    pub fn shell(&self, id: &str) -> Option<&AssetAdministrationShell> {
        self.shells.iter().find(|s| s.id == id)
    }

    /// Submodel by id.
    #[must_use]
    pub fn submodel(&self, id: &str) -> Option<&Submodel> {
        self.submodels.iter().find(|s| s.id == id)
    }

    /// Submodel by id, mutably.
    pub fn submodel_mut(&mut self, id: &str) -> Option<&mut Submodel> {
        self.submodels.iter_mut().find(|s| s.id == id)
    }

    /// Resolve a reference to a copy of the addressed referable.
    #[must_use]
    pub fn resolve(&self, reference: &Reference) -> Option<Referable> {
        let first = reference.first();
        match first.key_type {
            KeyType::AssetAdministrationShell if reference.is_identifiable() => {
                self.shell(&first.value).cloned().map(Referable::Shell)
            }
            KeyType::Submodel if reference.is_identifiable() => {
                self.submodel(&first.value).cloned().map(Referable::Submodel)
            }
            KeyType::Submodel => self
                .resolve_element(reference)
                .cloned()
                .map(Referable::SubmodelElement),
            _ => None,
        }
    }

    /// Resolve a reference to a submodel element.
    #[must_use]
    pub fn resolve_element(&self, reference: &Reference) -> Option<&SubmodelElement> {
        let (first, path) = reference.keys().split_first()?;
        if first.key_type != KeyType::Submodel {
            return None;
        }
        self.submodel(&first.value)?.element(path)
    }

    /// Resolve a reference to a submodel element, mutably.
    pub fn resolve_element_mut(&mut self, reference: &Reference) -> Option<&mut SubmodelElement> {
        let (first, path) = reference.keys().split_first()?;
        if first.key_type != KeyType::Submodel {
            return None;
        }
        self.submodel_mut(&first.value)?.element_mut(path)
    }

    /// Child elements of a submodel, collection or entity.
    #[must_use]
    pub fn children(&self, parent: &Reference) -> Option<&[SubmodelElement]> {
        let (first, path) = parent.keys().split_first()?;
        if first.key_type != KeyType::Submodel {
            return None;
        }
        self.submodel(&first.value)?.children(path)
    }

    /// Mutable child elements of a submodel, collection or entity.
    pub fn children_mut(&mut self, parent: &Reference) -> Option<&mut Vec<SubmodelElement>> {
        let (first, path) = parent.keys().split_first()?;
        if first.key_type != KeyType::Submodel {
            return None;
        }
        self.submodel_mut(&first.value)?.children_mut(path)
    }
}
