//! Structural addressing of model elements.
//!
//! A [`Reference`] is an ordered, non-empty list of typed keys. The first key
//! names an identifiable (shell or submodel) by its id, every following key
//! names a nested submodel element by its `idShort`.
//!
//! # Text Form
//!
//! `(Submodel)urn:example:sm:1, (SubmodelElementCollection)Motor, (Property)Speed`
//!
//! The text form is used for `Display`, `FromStr`, serde and configuration map keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The type of the element a [`Key`] points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyType {
    /// An asset administration shell
    AssetAdministrationShell,
    /// A submodel
    Submodel,
    /// A single-valued property
    Property,
    /// A range with min/max values
    Range,
    /// A multi-language property
    MultiLanguageProperty,
    /// A blob (binary data)
    Blob,
    /// A file reference
    File,
    /// A reference element
    ReferenceElement,
    /// A relationship between two references
    RelationshipElement,
    /// An entity element
    Entity,
    /// A submodel element collection
    SubmodelElementCollection,
    /// An operation element
    Operation,
    /// A capability element
    Capability,
}

impl KeyType {
    const ALL: [KeyType; 13] = [
        KeyType::AssetAdministrationShell,
        KeyType::Submodel,
        KeyType::Property,
        KeyType::Range,
        KeyType::MultiLanguageProperty,
        KeyType::Blob,
        KeyType::File,
        KeyType::ReferenceElement,
        KeyType::RelationshipElement,
        KeyType::Entity,
        KeyType::SubmodelElementCollection,
        KeyType::Operation,
        KeyType::Capability,
    ];

    /// The name used in the text form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::AssetAdministrationShell => "AssetAdministrationShell",
            KeyType::Submodel => "Submodel",
            KeyType::Property => "Property",
            KeyType::Range => "Range",
            KeyType::MultiLanguageProperty => "MultiLanguageProperty",
            KeyType::Blob => "Blob",
            KeyType::File => "File",
            KeyType::ReferenceElement => "ReferenceElement",
            KeyType::RelationshipElement => "RelationshipElement",
            KeyType::Entity => "Entity",
            KeyType::SubmodelElementCollection => "SubmodelElementCollection",
            KeyType::Operation => "Operation",
            KeyType::Capability => "Capability",
        }
    }

    /// Whether this key names an identifiable (addressed by id, not idShort).
    #[must_use]
    pub fn is_identifiable(&self) -> bool {
        matches!(self, KeyType::AssetAdministrationShell | KeyType::Submodel)
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kt| kt.as_str() == s)
            .ok_or_else(|| ReferenceError::UnknownKeyType(s.to_string()))
    }
}

/// One step of a [`Reference`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    /// Type of the addressed element
    pub key_type: KeyType,
    /// Id (identifiables) or idShort (submodel elements)
    pub value: String,
}

impl Key {
    /// Create a new key.
    #[must_use]
    pub fn new(key_type: KeyType, value: impl Into<String>) -> Self {
        Self {
            key_type,
            value: value.into(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}){}", self.key_type, self.value)
    }
}

/// Ordered, typed path addressing one model element.
///
/// Equality is structural, so references are used as map keys throughout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Reference {
    keys: Vec<Key>,
}

impl Reference {
    /// Create a reference from keys.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Empty`] if `keys` is empty.
    pub fn new(keys: Vec<Key>) -> Result<Self, ReferenceError> {
        if keys.is_empty() {
            return Err(ReferenceError::Empty);
        }
        Ok(Self { keys })
    }

    /// Reference to a submodel.
    #[must_use]
    pub fn submodel(id: impl Into<String>) -> Self {
        Self {
            keys: vec![Key::new(KeyType::Submodel, id)],
        }
    }

    /// Reference to an asset administration shell.
    #[must_use]
    pub fn shell(id: impl Into<String>) -> Self {
        Self {
            keys: vec![Key::new(KeyType::AssetAdministrationShell, id)],
        }
    }

    /// Reference to a child of this element.
    #[must_use]
    pub fn child(&self, key_type: KeyType, id_short: impl Into<String>) -> Self {
        let mut keys = self.keys.clone();
        keys.push(Key::new(key_type, id_short));
        Self { keys }
    }

    /// Reference to the parent element, `None` for identifiables.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.keys.len() < 2 {
            return None;
        }
        Some(Self {
            keys: self.keys[..self.keys.len() - 1].to_vec(),
        })
    }

    /// All keys, root first.
    #[must_use]
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// The first key (the identifiable).
    #[must_use]
    pub fn first(&self) -> &Key {
        &self.keys[0]
    }

    /// The last key (the addressed element).
    #[must_use]
    pub fn last(&self) -> &Key {
        &self.keys[self.keys.len() - 1]
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always `false`; references are never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Id of the identifiable this reference is rooted at.
    #[must_use]
    pub fn identifiable_id(&self) -> &str {
        &self.first().value
    }

    /// Whether this reference addresses an identifiable itself.
    #[must_use]
    pub fn is_identifiable(&self) -> bool {
        self.keys.len() == 1
    }

    /// Whether `prefix` is this reference or one of its ancestors.
    #[must_use]
    pub fn starts_with(&self, prefix: &Reference) -> bool {
        self.keys.starts_with(&prefix.keys)
    }

    /// The dot-separated idShort path below the identifiable.
    #[must_use]
    pub fn id_short_path(&self) -> String {
        self.keys[1..]
            .iter()
            .map(|k| k.value.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

impl FromStr for Reference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut keys: Vec<Key> = Vec::new();

        for part in s.split(',') {
            let trimmed = part.trim_start();
            if let Some((ty, value)) = trimmed
                .strip_prefix('(')
                .and_then(|rest| rest.split_once(')'))
            {
                if let Ok(key_type) = ty.parse::<KeyType>() {
                    keys.push(Key::new(key_type, value.trim_end()));
                    continue;
                }
            }
            // A comma inside a value, re-join with the previous key
            match keys.last_mut() {
                Some(key) => {
                    key.value.push(',');
                    key.value.push_str(part.trim_end());
                }
                None => return Err(ReferenceError::Parse(s.to_string())),
            }
        }

        Self::new(keys)
    }
}

impl TryFrom<String> for Reference {
    type Error = ReferenceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Reference> for String {
    fn from(value: Reference) -> Self {
        value.to_string()
    }
}

/// Errors that can occur building or parsing references.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    /// Reference has no keys
    #[error("reference must contain at least one key")]
    Empty,
    /// Text form could not be parsed
    #[error("invalid reference: {0}")]
    Parse(String),
    /// Unknown key type name
    #[error("unknown key type: {0}")]
    UnknownKeyType(String),
}
