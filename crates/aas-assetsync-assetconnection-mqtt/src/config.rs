//! MQTT connection configuration.

use aas_assetsync_assetconnection::AssetConnectionError;
use aas_assetsync_core::Reference;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// Configuration of one MQTT asset connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MqttAssetConnectionConfig {
    /// Broker URI (e.g., <tcp://localhost:1883>)
    pub server_uri: String,
    /// Client ID for the MQTT session
    pub client_id: String,
    /// Optional username
    pub username: Option<String>,
    /// Optional password
    pub password: Option<String>,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u64,
    /// Seconds to wait for the broker's `CONNACK` on connect
    pub connect_timeout_secs: u64,
    /// Value providers by element reference
    pub value_providers: HashMap<Reference, MqttValueProviderConfig>,
    /// Subscription providers by element reference
    pub subscription_providers: HashMap<Reference, MqttSubscriptionProviderConfig>,
}

impl Default for MqttAssetConnectionConfig {
    fn default() -> Self {
        Self {
            server_uri: "tcp://localhost:1883".to_string(),
            client_id: "aas-assetsync".to_string(),
            username: None,
            password: None,
            keep_alive_secs: 30,
            connect_timeout_secs: 10,
            value_providers: HashMap::new(),
            subscription_providers: HashMap::new(),
        }
    }
}

/// Publishes written values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttValueProviderConfig {
    /// Topic to publish to
    pub topic: String,
    /// Payload template with a `${value}` placeholder
    #[serde(default)]
    pub template: Option<String>,
    /// Publish with the retain flag
    #[serde(default)]
    pub retain: bool,
}

/// Maps received messages to element values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttSubscriptionProviderConfig {
    /// Topic filter, `+` and `#` wildcards allowed
    pub topic: String,
    /// JSON pointer selecting the value inside the payload
    #[serde(default)]
    pub query: Option<String>,
}

/// Parse a broker URI into host and port.
///
/// Accepts `tcp://host:port`, `mqtt://host:port` and bare `host:port`; the
/// port defaults to 1883.
///
/// # Errors
///
/// Returns [`AssetConnectionError::Configuration`] for malformed URIs.
pub fn parse_server_uri(input: &str) -> Result<(String, u16), AssetConnectionError> {
    let invalid = |detail: String| {
        AssetConnectionError::Configuration(format!("invalid MQTT server URI {input}: {detail}"))
    };

    if input.contains("://") {
        let url = Url::parse(input).map_err(|e| invalid(e.to_string()))?;

        match url.scheme() {
            "tcp" | "mqtt" => {}
            scheme => return Err(invalid(format!("unsupported scheme '{scheme}'"))),
        }

        let host = url
            .host_str()
            .ok_or_else(|| invalid("missing host".to_string()))?;
        let port = url.port().unwrap_or(1883);

        return Ok((host.to_string(), port));
    }

    let mut parts = input.split(':');
    let host = parts
        .next()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| invalid("missing host".to_string()))?;
    let port = match parts.next() {
        None => 1883,
        Some(port) => port
            .parse()
            .map_err(|_| invalid(format!("invalid port '{port}'")))?,
    };
    if parts.next().is_some() {
        return Err(invalid("too many ':' separators".to_string()));
    }

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_server_uri_tcp() {
        let (host, port) = parse_server_uri("tcp://localhost:1883").unwrap();
        assert_eq!(host, "localhost");
        assert_eq!(port, 1883);
    }

    #[test]
    fn parse_server_uri_default_port() {
        let (host, port) = parse_server_uri("mqtt://broker.example.com").unwrap();
        assert_eq!(host, "broker.example.com");
        assert_eq!(port, 1883);
    }

    #[test]
    fn parse_server_uri_rejects_other_schemes() {
        assert!(parse_server_uri("ws://localhost:9001").is_err());
        assert!(parse_server_uri("localhost:18x3").is_err());
        assert!(parse_server_uri(":1883").is_err());
    }

    #[test]
    fn config_from_json() {
        let json = serde_json::json!({
            "serverUri": "tcp://plc.local:1884",
            "clientId": "pump-1",
            "valueProviders": {
                "(Submodel)urn:sm, (Property)Setpoint": { "topic": "pump/setpoint", "template": "{\"v\": ${value}}" }
            },
            "subscriptionProviders": {
                "(Submodel)urn:sm, (Property)Temperature": { "topic": "pump/+/temperature", "query": "/value" }
            }
        });
        let config: MqttAssetConnectionConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.client_id, "pump-1");
        assert_eq!(config.keep_alive_secs, 30);
        let (reference, provider) = config.subscription_providers.iter().next().unwrap();
        assert_eq!(reference.last().value, "Temperature");
        assert_eq!(provider.query.as_deref(), Some("/value"));
        assert!(!config.value_providers.values().next().unwrap().retain);
    }
}
