//! Server configuration.

use aas_assetsync_assetconnection_http::HttpAssetConnectionConfig;
use aas_assetsync_assetconnection_mqtt::MqttAssetConnectionConfig;
use aas_assetsync_service::CoreConfig;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default location of the configuration file.
const DEFAULT_CONFIG_PATH: &str = "./config.json";

/// Complete server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    /// Engine settings
    pub core: CoreConfig,

    /// Model store
    pub persistence: PersistenceConfig,

    /// Asset connections to establish
    pub asset_connections: Vec<AssetConnectionConfig>,
}

/// Store type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    /// Volatile in-memory store
    #[default]
    Memory,
    /// SQLite file
    Sqlite,
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistenceConfig {
    /// Store type
    #[serde(rename = "type")]
    pub store_type: StoreType,

    /// Database path (for SQLite)
    pub db_path: PathBuf,

    /// Environment JSON file loaded at startup
    pub initial_model: Option<PathBuf>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::Memory,
            db_path: PathBuf::from("./assetsync.db"),
            initial_model: None,
        }
    }
}

/// One asset connection.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetConnectionConfig {
    /// Name used in logs, defaults to the protocol and position
    #[serde(default)]
    pub name: Option<String>,

    /// Protocol-specific settings
    #[serde(flatten)]
    pub protocol: ProtocolConfig,
}

/// Protocol-specific connection settings, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProtocolConfig {
    /// MQTT broker
    Mqtt(MqttAssetConnectionConfig),
    /// HTTP endpoint
    Http(HttpAssetConnectionConfig),
}

impl ProtocolConfig {
    /// Protocol name.
    #[must_use]
    pub fn protocol(&self) -> &'static str {
        match self {
            ProtocolConfig::Mqtt(_) => "mqtt",
            ProtocolConfig::Http(_) => "http",
        }
    }
}

impl ServiceConfig {
    /// Load configuration from the file and environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `AASSYNC_CONFIG`: Configuration file (default `./config.json` if present)
    /// - `AASSYNC_STORE_TYPE`: "memory" or "sqlite"
    /// - `AASSYNC_DB_PATH`: SQLite database path
    /// - `AASSYNC_MODEL`: Environment JSON file loaded at startup
    /// - `AASSYNC_SUBSCRIPTION_BUFFER`: Capacity of the subscription queue
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or a value is invalid.
    pub fn from_env() -> Result<Self> {
        Self::load(|key| std::env::var(key).ok())
    }

    /// Load configuration, resolving variables through `var`.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or a value is invalid.
    pub fn load(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match var("AASSYNC_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };

        if let Some(store_type) = var("AASSYNC_STORE_TYPE") {
            config.persistence.store_type = match store_type.as_str() {
                "memory" => StoreType::Memory,
                "sqlite" => StoreType::Sqlite,
                other => bail!("Invalid AASSYNC_STORE_TYPE: {other}"),
            };
        }

        if let Some(db_path) = var("AASSYNC_DB_PATH") {
            config.persistence.db_path = PathBuf::from(db_path);
        }

        if let Some(model) = var("AASSYNC_MODEL") {
            config.persistence.initial_model = Some(PathBuf::from(model));
        }

        if let Some(buffer) = var("AASSYNC_SUBSCRIPTION_BUFFER") {
            config.core.subscription_buffer = buffer
                .parse()
                .context("Invalid AASSYNC_SUBSCRIPTION_BUFFER")?;
        }

        Ok(config)
    }

    /// Read a configuration file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }
}
