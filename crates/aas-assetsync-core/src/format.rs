//! Value-only JSON form of element values.
//!
//! Asset payloads carry values in the AAS value-only serialization:
//!
//! | Element | JSON |
//! |---------|------|
//! | Property | primitive (`25.5`, `"on"`, `true`) |
//! | Range | `{"min": .., "max": ..}` |
//! | MultiLanguageProperty | `[{"en": "text"}, {"de": "Text"}]` |
//! | Blob | `{"contentType": .., "value": "<base64>"}` |
//! | File | `{"contentType": .., "value": "/path"}` |
//! | ReferenceElement | reference text form |
//! | RelationshipElement | `{"first": .., "second": ..}` |
//! | Entity | `{"entityType": .., "globalAssetId": .., "statements": {..}}` |
//! | SubmodelElementCollection | `{"idShort": value, ..}` |

use crate::model::EntityType;
use crate::reference::Reference;
use crate::value::{DataType, ElementValue, TypeInfo, TypedValue, ValueMappingError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

impl TypedValue {
    /// Interpret a JSON primitive as a value of `data_type`.
    ///
    /// Strings are read as the lexical form of the type.
    ///
    /// # Errors
    ///
    /// Returns [`ValueMappingError::TypeMismatch`] when the JSON kind does not fit.
    pub fn from_json(data_type: DataType, json: &Value) -> Result<Self, ValueMappingError> {
        match (data_type, json) {
            (_, Value::String(s)) => TypedValue::parse(data_type, s),
            (DataType::Boolean, Value::Bool(b)) => Ok(TypedValue::Boolean(*b)),
            (DataType::Integer, Value::Number(n)) => n
                .as_i64()
                .map(TypedValue::Integer)
                .ok_or_else(|| ValueMappingError::InvalidValue(format!("{n} is not an integer"))),
            (DataType::Double, Value::Number(n)) => n
                .as_f64()
                .map(TypedValue::Double)
                .ok_or_else(|| ValueMappingError::InvalidValue(format!("{n} is not a double"))),
            _ => Err(mismatch(data_type, json)),
        }
    }

    /// JSON primitive for this value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            TypedValue::String(s) | TypedValue::DateTime(s) => Value::String(s.clone()),
            TypedValue::Boolean(b) => Value::Bool(*b),
            TypedValue::Integer(i) => Value::from(*i),
            TypedValue::Double(d) => Value::from(*d),
        }
    }
}

impl ElementValue {
    /// Parse the value-only JSON form for an element of type `type_info`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValueMappingError`] if `json` does not fit `type_info`.
    pub fn from_json(type_info: &TypeInfo, json: &Value) -> Result<Self, ValueMappingError> {
        match type_info {
            TypeInfo::Property(data_type) => Ok(ElementValue::Property(optional_typed(
                *data_type,
                Some(json),
            )?)),
            TypeInfo::Range(data_type) => {
                let object = as_object(json, "Range")?;
                Ok(ElementValue::Range {
                    min: optional_typed(*data_type, object.get("min"))?,
                    max: optional_typed(*data_type, object.get("max"))?,
                })
            }
            TypeInfo::MultiLanguage => multi_language_from_json(json),
            TypeInfo::Blob { content_type } => {
                let (mime_type, encoded) = content_and_value(json, content_type, "Blob")?;
                let content = match encoded {
                    Some(encoded) => BASE64
                        .decode(encoded)
                        .map_err(|e| ValueMappingError::InvalidValue(format!("blob content: {e}")))?,
                    None => Vec::new(),
                };
                Ok(ElementValue::Blob { mime_type, content })
            }
            TypeInfo::File { content_type } => {
                let (content_type, path) = content_and_value(json, content_type, "File")?;
                Ok(ElementValue::File { content_type, path })
            }
            TypeInfo::Reference => Ok(ElementValue::Reference(reference_from_json(json)?)),
            TypeInfo::Relationship => {
                let object = as_object(json, "RelationshipElement")?;
                Ok(ElementValue::Relationship {
                    first: object.get("first").map(reference_from_json).transpose()?.flatten(),
                    second: object.get("second").map(reference_from_json).transpose()?.flatten(),
                })
            }
            TypeInfo::Entity(statement_types) => {
                let object = as_object(json, "Entity")?;
                let global_asset_id = object
                    .get("globalAssetId")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let entity_type = match object.get("entityType").and_then(Value::as_str) {
                    Some("SelfManagedEntity") => EntityType::SelfManagedEntity,
                    Some("CoManagedEntity") => EntityType::CoManagedEntity,
                    Some(other) => {
                        return Err(ValueMappingError::InvalidValue(format!(
                            "unknown entity type {other}"
                        )))
                    }
                    None if global_asset_id.is_some() => EntityType::SelfManagedEntity,
                    None => EntityType::CoManagedEntity,
                };
                let statements = match object.get("statements") {
                    Some(statements) => children_from_json(statement_types, statements)?,
                    None => BTreeMap::new(),
                };
                Ok(ElementValue::Entity {
                    entity_type,
                    global_asset_id,
                    statements,
                })
            }
            TypeInfo::Collection(child_types) => Ok(ElementValue::Collection(
                children_from_json(child_types, json)?,
            )),
        }
    }

    /// Value-only JSON form of this value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            ElementValue::Property(value) => value.as_ref().map_or(Value::Null, TypedValue::to_json),
            ElementValue::Range { min, max } => {
                let mut object = Map::new();
                object.insert("min".into(), min.as_ref().map_or(Value::Null, TypedValue::to_json));
                object.insert("max".into(), max.as_ref().map_or(Value::Null, TypedValue::to_json));
                Value::Object(object)
            }
            ElementValue::MultiLanguage(texts) => Value::Array(
                texts
                    .iter()
                    .map(|(lang, text)| {
                        let mut entry = Map::new();
                        entry.insert(lang.clone(), Value::String(text.clone()));
                        Value::Object(entry)
                    })
                    .collect(),
            ),
            ElementValue::Blob { mime_type, content } => {
                let mut object = Map::new();
                object.insert("contentType".into(), Value::String(mime_type.clone()));
                object.insert("value".into(), Value::String(BASE64.encode(content)));
                Value::Object(object)
            }
            ElementValue::File { content_type, path } => {
                let mut object = Map::new();
                object.insert("contentType".into(), Value::String(content_type.clone()));
                object.insert(
                    "value".into(),
                    path.clone().map_or(Value::Null, Value::String),
                );
                Value::Object(object)
            }
            ElementValue::Reference(reference) => reference_to_json(reference.as_ref()),
            ElementValue::Relationship { first, second } => {
                let mut object = Map::new();
                object.insert("first".into(), reference_to_json(first.as_ref()));
                object.insert("second".into(), reference_to_json(second.as_ref()));
                Value::Object(object)
            }
            ElementValue::Entity {
                entity_type,
                global_asset_id,
                statements,
            } => {
                let mut object = Map::new();
                let entity_type = match entity_type {
                    EntityType::CoManagedEntity => "CoManagedEntity",
                    EntityType::SelfManagedEntity => "SelfManagedEntity",
                };
                object.insert("entityType".into(), Value::String(entity_type.to_string()));
                if let Some(id) = global_asset_id {
                    object.insert("globalAssetId".into(), Value::String(id.clone()));
                }
                object.insert("statements".into(), children_to_json(statements));
                Value::Object(object)
            }
            ElementValue::Collection(children) => children_to_json(children),
        }
    }
}

fn optional_typed(
    data_type: DataType,
    json: Option<&Value>,
) -> Result<Option<TypedValue>, ValueMappingError> {
    match json {
        None | Some(Value::Null) => Ok(None),
        Some(json) => TypedValue::from_json(data_type, json).map(Some),
    }
}

fn multi_language_from_json(json: &Value) -> Result<ElementValue, ValueMappingError> {
    let mut texts = BTreeMap::new();
    let mut insert_all = |object: &Map<String, Value>| -> Result<(), ValueMappingError> {
        for (lang, text) in object {
            let text = text.as_str().ok_or_else(|| ValueMappingError::TypeMismatch {
                expected: "string".to_string(),
                actual: json_kind(text).to_string(),
            })?;
            texts.insert(lang.clone(), text.to_string());
        }
        Ok(())
    };
    match json {
        Value::Array(entries) => {
            for entry in entries {
                insert_all(as_object(entry, "MultiLanguageProperty")?)?;
            }
        }
        Value::Object(object) => insert_all(object)?,
        other => return Err(mismatch("MultiLanguageProperty", other)),
    }
    Ok(ElementValue::MultiLanguage(texts))
}

fn content_and_value(
    json: &Value,
    declared_type: &str,
    kind: &str,
) -> Result<(String, Option<String>), ValueMappingError> {
    match json {
        Value::String(s) => Ok((declared_type.to_string(), Some(s.clone()))),
        Value::Null => Ok((declared_type.to_string(), None)),
        Value::Object(object) => {
            let content_type = object
                .get("contentType")
                .and_then(Value::as_str)
                .unwrap_or(declared_type)
                .to_string();
            let value = object.get("value").and_then(Value::as_str).map(str::to_string);
            Ok((content_type, value))
        }
        other => Err(mismatch(kind, other)),
    }
}

fn reference_from_json(json: &Value) -> Result<Option<Reference>, ValueMappingError> {
    match json {
        Value::Null => Ok(None),
        Value::String(s) => s
            .parse()
            .map(Some)
            .map_err(|e| ValueMappingError::InvalidValue(format!("{e}"))),
        other => Err(mismatch("reference", other)),
    }
}

fn reference_to_json(reference: Option<&Reference>) -> Value {
    reference.map_or(Value::Null, |r| Value::String(r.to_string()))
}

fn children_from_json(
    types: &BTreeMap<String, TypeInfo>,
    json: &Value,
) -> Result<BTreeMap<String, ElementValue>, ValueMappingError> {
    let object = as_object(json, "SubmodelElementCollection")?;
    let mut children = BTreeMap::new();
    for (id_short, child) in object {
        let type_info = types.get(id_short).ok_or_else(|| {
            ValueMappingError::InvalidValue(format!("unknown child element {id_short}"))
        })?;
        children.insert(id_short.clone(), ElementValue::from_json(type_info, child)?);
    }
    Ok(children)
}

fn children_to_json(children: &BTreeMap<String, ElementValue>) -> Value {
    Value::Object(
        children
            .iter()
            .map(|(id_short, value)| (id_short.clone(), value.to_json()))
            .collect(),
    )
}

fn as_object<'a>(json: &'a Value, kind: &str) -> Result<&'a Map<String, Value>, ValueMappingError> {
    json.as_object().ok_or_else(|| mismatch(kind, json))
}

fn mismatch(expected: impl ToString, json: &Value) -> ValueMappingError {
    ValueMappingError::TypeMismatch {
        expected: expected.to_string(),
        actual: json_kind(json).to_string(),
    }
}

fn json_kind(json: &Value) -> &'static str {
    match json {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn property_from_number_and_string() {
        let info = TypeInfo::Property(DataType::Double);
        assert_eq!(
            ElementValue::from_json(&info, &json!(25.5)).unwrap(),
            ElementValue::Property(Some(TypedValue::Double(25.5)))
        );
        assert_eq!(
            ElementValue::from_json(&info, &json!("25.5")).unwrap(),
            ElementValue::Property(Some(TypedValue::Double(25.5)))
        );
        assert_eq!(
            ElementValue::from_json(&info, &Value::Null).unwrap(),
            ElementValue::Property(None)
        );
    }

    #[test]
    fn property_type_mismatch_is_rejected() {
        let info = TypeInfo::Property(DataType::Boolean);
        let err = ElementValue::from_json(&info, &json!(3)).unwrap_err();
        assert!(matches!(err, ValueMappingError::TypeMismatch { .. }));

        let info = TypeInfo::Property(DataType::String);
        assert!(ElementValue::from_json(&info, &json!(true)).is_err());
    }

    #[test]
    fn collection_uses_child_types() {
        let mut types = BTreeMap::new();
        types.insert("Speed".to_string(), TypeInfo::Property(DataType::Integer));
        types.insert("Label".to_string(), TypeInfo::MultiLanguage);
        let info = TypeInfo::Collection(types);

        let value =
            ElementValue::from_json(&info, &json!({"Speed": 1200, "Label": [{"en": "Motor"}]}))
                .unwrap();
        let ElementValue::Collection(children) = &value else {
            panic!("expected collection");
        };
        assert_eq!(
            children["Speed"],
            ElementValue::Property(Some(TypedValue::Integer(1200)))
        );
        assert_eq!(value.to_json(), json!({"Speed": 1200, "Label": [{"en": "Motor"}]}));

        assert!(ElementValue::from_json(&info, &json!({"Unknown": 1})).is_err());
    }

    #[test]
    fn blob_content_is_base64() {
        let info = TypeInfo::Blob {
            content_type: "application/octet-stream".to_string(),
        };
        let value = ElementValue::from_json(&info, &json!("aGVsbG8=")).unwrap();
        assert_eq!(
            value,
            ElementValue::Blob {
                mime_type: "application/octet-stream".to_string(),
                content: b"hello".to_vec(),
            }
        );
        assert_eq!(value.to_json()["value"], json!("aGVsbG8="));
    }

    #[test]
    fn relationship_references() {
        let value = ElementValue::from_json(
            &TypeInfo::Relationship,
            &json!({"first": "(Submodel)urn:a, (Property)X", "second": null}),
        )
        .unwrap();
        let ElementValue::Relationship { first, second } = value else {
            panic!("expected relationship");
        };
        assert_eq!(first.unwrap().last().value, "X");
        assert!(second.is_none());
    }
}
