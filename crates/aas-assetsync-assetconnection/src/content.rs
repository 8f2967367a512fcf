//! Mapping between raw asset payloads and element values.
//!
//! Payloads are JSON in the value-only form; a payload that is not valid JSON
//! is read as a plain string. A `query` (JSON pointer, e.g. `/data/temperature`)
//! selects a nested part of the payload. A write `template` embeds the rendered
//! value at every `${value}` placeholder.

use crate::error::AssetConnectionError;
use aas_assetsync_core::{ElementValue, Reference, TypeInfo};
use serde_json::Value;

/// Placeholder replaced by the rendered value in write templates.
pub const VALUE_PLACEHOLDER: &str = "${value}";

/// Parse a raw payload into a value of `type_info`.
///
/// # Errors
///
/// Returns [`AssetConnectionError::Io`] if `query` does not match, or
/// [`AssetConnectionError::Mapping`] if the value does not fit `type_info`.
pub fn parse_payload(
    reference: &Reference,
    payload: &[u8],
    query: Option<&str>,
    type_info: &TypeInfo,
) -> Result<ElementValue, AssetConnectionError> {
    let json = serde_json::from_slice::<Value>(payload)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(payload).trim().to_string()));

    let selected = match query {
        Some(query) if !query.is_empty() => {
            json.pointer(query)
                .ok_or_else(|| AssetConnectionError::Io {
                    reference: reference.clone(),
                    detail: format!("query {query} does not match payload"),
                })?
        }
        _ => &json,
    };

    ElementValue::from_json(type_info, selected).map_err(|source| AssetConnectionError::Mapping {
        reference: reference.clone(),
        source,
    })
}

/// Render a value for writing, optionally through `template`.
#[must_use]
pub fn render_payload(value: &ElementValue, template: Option<&str>) -> String {
    let rendered = match value.to_json() {
        Value::String(s) => s,
        other => other.to_string(),
    };
    match template {
        Some(template) => template.replace(VALUE_PLACEHOLDER, &rendered),
        None => rendered,
    }
}
