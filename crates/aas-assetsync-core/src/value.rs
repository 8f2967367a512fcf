//! Protocol-neutral element values.
//!
//! An [`ElementValue`] is the data part of a submodel element, detached from
//! its metadata. Asset connections produce and consume values, the model
//! tree stores them (see [`SubmodelElement::set_value`](crate::SubmodelElement::set_value)).

use crate::model::EntityType;
use crate::reference::Reference;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// XSD data type of a property or range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// `xs:string`
    #[serde(rename = "xs:string")]
    String,
    /// `xs:boolean`
    #[serde(rename = "xs:boolean")]
    Boolean,
    /// `xs:int`, `xs:long` and friends
    #[serde(rename = "xs:long", alias = "xs:int", alias = "xs:integer", alias = "xs:short")]
    Integer,
    /// `xs:double` / `xs:float`
    #[serde(rename = "xs:double", alias = "xs:float", alias = "xs:decimal")]
    Double,
    /// `xs:dateTime`
    #[serde(rename = "xs:dateTime")]
    DateTime,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::String => "xs:string",
            DataType::Boolean => "xs:boolean",
            DataType::Integer => "xs:long",
            DataType::Double => "xs:double",
            DataType::DateTime => "xs:dateTime",
        };
        f.write_str(name)
    }
}

/// A scalar value tagged with its data type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// String value
    String(String),
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Double(f64),
    /// Lexical `xs:dateTime`
    DateTime(String),
}

impl TypedValue {
    /// Data type of this value.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            TypedValue::String(_) => DataType::String,
            TypedValue::Boolean(_) => DataType::Boolean,
            TypedValue::Integer(_) => DataType::Integer,
            TypedValue::Double(_) => DataType::Double,
            TypedValue::DateTime(_) => DataType::DateTime,
        }
    }

    /// Parse a lexical representation.
    ///
    /// # Errors
    ///
    /// Returns [`ValueMappingError::InvalidValue`] if `lexical` is not valid for `data_type`.
    pub fn parse(data_type: DataType, lexical: &str) -> Result<Self, ValueMappingError> {
        let invalid = || ValueMappingError::InvalidValue(format!("'{lexical}' is not a valid {data_type}"));
        match data_type {
            DataType::String => Ok(TypedValue::String(lexical.to_string())),
            DataType::Boolean => match lexical.trim() {
                "true" | "1" => Ok(TypedValue::Boolean(true)),
                "false" | "0" => Ok(TypedValue::Boolean(false)),
                _ => Err(invalid()),
            },
            DataType::Integer => lexical
                .trim()
                .parse()
                .map(TypedValue::Integer)
                .map_err(|_| invalid()),
            DataType::Double => lexical
                .trim()
                .parse()
                .map(TypedValue::Double)
                .map_err(|_| invalid()),
            DataType::DateTime => Ok(TypedValue::DateTime(lexical.trim().to_string())),
        }
    }

    /// Lexical representation as stored in the model.
    #[must_use]
    pub fn to_lexical(&self) -> String {
        match self {
            TypedValue::String(s) | TypedValue::DateTime(s) => s.clone(),
            TypedValue::Boolean(b) => b.to_string(),
            TypedValue::Integer(i) => i.to_string(),
            TypedValue::Double(d) => d.to_string(),
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_lexical())
    }
}

/// The value of a submodel element.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// Property value, `None` if unset
    Property(Option<TypedValue>),
    /// Range bounds
    Range {
        /// Lower bound
        min: Option<TypedValue>,
        /// Upper bound
        max: Option<TypedValue>,
    },
    /// Text per language code
    MultiLanguage(BTreeMap<String, String>),
    /// Binary content
    Blob {
        /// MIME type of the content
        mime_type: String,
        /// Raw bytes
        content: Vec<u8>,
    },
    /// File pointer
    File {
        /// MIME type of the file
        content_type: String,
        /// Path or URI of the file
        path: Option<String>,
    },
    /// Reference element value
    Reference(Option<Reference>),
    /// Relationship endpoints
    Relationship {
        /// First endpoint
        first: Option<Reference>,
        /// Second endpoint
        second: Option<Reference>,
    },
    /// Entity with its statements
    Entity {
        /// Co-managed or self-managed
        entity_type: EntityType,
        /// Global asset id of a self-managed entity
        global_asset_id: Option<String>,
        /// Statement values by idShort
        statements: BTreeMap<String, ElementValue>,
    },
    /// Collection values by idShort
    Collection(BTreeMap<String, ElementValue>),
}

impl ElementValue {
    /// Whether this value belongs to a data element.
    ///
    /// Only data element values are written through to assets.
    #[must_use]
    pub fn is_data_element(&self) -> bool {
        matches!(
            self,
            ElementValue::Property(_)
                | ElementValue::Range { .. }
                | ElementValue::MultiLanguage(_)
                | ElementValue::Blob { .. }
                | ElementValue::File { .. }
                | ElementValue::Reference(_)
        )
    }

    /// Short variant name, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ElementValue::Property(_) => "Property",
            ElementValue::Range { .. } => "Range",
            ElementValue::MultiLanguage(_) => "MultiLanguageProperty",
            ElementValue::Blob { .. } => "Blob",
            ElementValue::File { .. } => "File",
            ElementValue::Reference(_) => "ReferenceElement",
            ElementValue::Relationship { .. } => "RelationshipElement",
            ElementValue::Entity { .. } => "Entity",
            ElementValue::Collection(_) => "SubmodelElementCollection",
        }
    }
}

/// Declared type of a model element, as needed to interpret raw asset data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeInfo {
    /// Property of the given data type
    Property(DataType),
    /// Range of the given data type
    Range(DataType),
    /// Multi-language property
    MultiLanguage,
    /// Blob with its declared MIME type
    Blob {
        /// Declared MIME type
        content_type: String,
    },
    /// File with its declared MIME type
    File {
        /// Declared MIME type
        content_type: String,
    },
    /// Reference element
    Reference,
    /// Relationship element
    Relationship,
    /// Entity with statement types by idShort
    Entity(BTreeMap<String, TypeInfo>),
    /// Collection with child types by idShort
    Collection(BTreeMap<String, TypeInfo>),
}

/// Errors that can occur mapping values onto model elements.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueMappingError {
    /// Value variant or data type does not match the element
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Declared type of the element
        expected: String,
        /// Type of the offered value
        actual: String,
    },
    /// Value is malformed for its declared type
    #[error("invalid value: {0}")]
    InvalidValue(String),
    /// Element kind has no value
    #[error("element kind has no value: {0}")]
    NotSupported(String),
}
