//! HTTP connection configuration.

use aas_assetsync_core::Reference;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration of one HTTP asset connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpAssetConnectionConfig {
    /// Base URL all provider paths are resolved against (e.g., <http://localhost:8080>)
    pub base_url: String,
    /// Headers sent with every request
    pub headers: HashMap<String, String>,
    /// Optional bearer token for authentication
    pub bearer_token: Option<String>,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Value providers by element reference
    pub value_providers: HashMap<Reference, HttpValueProviderConfig>,
    /// Polling subscription providers by element reference
    pub subscription_providers: HashMap<Reference, HttpSubscriptionProviderConfig>,
    /// Operation providers by operation reference
    pub operation_providers: HashMap<Reference, HttpOperationProviderConfig>,
}

impl HttpAssetConnectionConfig {
    /// Request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HttpAssetConnectionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            headers: HashMap::new(),
            bearer_token: None,
            timeout_ms: 10_000,
            value_providers: HashMap::new(),
            subscription_providers: HashMap::new(),
            operation_providers: HashMap::new(),
        }
    }
}

/// HTTP method used for writes and invocations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    /// `PUT`
    #[default]
    Put,
    /// `POST`
    Post,
    /// `PATCH`
    Patch,
}

impl From<RequestMethod> for reqwest::Method {
    fn from(value: RequestMethod) -> Self {
        match value {
            RequestMethod::Put => reqwest::Method::PUT,
            RequestMethod::Post => reqwest::Method::POST,
            RequestMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

/// Reads and writes one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpValueProviderConfig {
    /// Resource path relative to the base URL
    pub path: String,
    /// JSON pointer selecting the value inside the response
    #[serde(default)]
    pub query: Option<String>,
    /// Request body template with a `${value}` placeholder
    #[serde(default)]
    pub template: Option<String>,
    /// Method used for writes
    #[serde(default)]
    pub write_method: RequestMethod,
}

/// Polls one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSubscriptionProviderConfig {
    /// Resource path relative to the base URL
    pub path: String,
    /// JSON pointer selecting the value inside the response
    #[serde(default)]
    pub query: Option<String>,
    /// Polling interval in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl HttpSubscriptionProviderConfig {
    /// Polling interval, at least one millisecond.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

fn default_interval_ms() -> u64 {
    1000
}

/// Invokes an operation with one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpOperationProviderConfig {
    /// Resource path relative to the base URL
    pub path: String,
    /// Method used for the invocation
    #[serde(default = "default_operation_method")]
    pub method: RequestMethod,
}

fn default_operation_method() -> RequestMethod {
    RequestMethod::Post
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_maps_are_keyed_by_reference_text() {
        let config: HttpAssetConnectionConfig = serde_json::from_value(serde_json::json!({
            "baseUrl": "http://plc.local:8080/api/",
            "valueProviders": {
                "(Submodel)urn:sm, (Property)Setpoint": {
                    "path": "setpoint",
                    "template": "{\"value\": ${value}}",
                    "writeMethod": "POST"
                }
            },
            "subscriptionProviders": {
                "(Submodel)urn:sm, (Property)Temperature": {
                    "path": "sensors",
                    "query": "/temperature"
                }
            },
            "operationProviders": {
                "(Submodel)urn:sm, (Operation)Reset": { "path": "reset" }
            }
        }))
        .unwrap();

        assert_eq!(config.base_url, "http://plc.local:8080/api/");
        assert_eq!(config.timeout_ms, 10_000);

        let (reference, value) = config.value_providers.iter().next().unwrap();
        assert_eq!(reference.last().value, "Setpoint");
        assert_eq!(value.write_method, RequestMethod::Post);

        let subscription = config.subscription_providers.values().next().unwrap();
        assert_eq!(subscription.interval(), Duration::from_secs(1));

        let operation = config.operation_providers.values().next().unwrap();
        assert_eq!(operation.method, RequestMethod::Post);
    }

    #[test]
    fn write_method_defaults_to_put() {
        let config: HttpValueProviderConfig =
            serde_json::from_value(serde_json::json!({ "path": "x" })).unwrap();
        assert_eq!(config.write_method, RequestMethod::Put);
        assert_eq!(reqwest::Method::from(config.write_method), reqwest::Method::PUT);
    }
}
