//! Server runtime orchestration.

use crate::config::{AssetConnectionConfig, ProtocolConfig, ServiceConfig, StoreType};
use aas_assetsync_assetconnection::{AssetConnection, AssetConnectionError, ServiceContext};
use aas_assetsync_assetconnection_http::HttpAssetConnection;
use aas_assetsync_assetconnection_mqtt::MqttAssetConnection;
use aas_assetsync_core::Environment;
use aas_assetsync_persistence::{MemoryPersistence, Persistence, SqlitePersistence};
use aas_assetsync_service::{PersistenceServiceContext, Service, SubscriptionInfo};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

/// The server: one engine over one store.
pub struct Server {
    service: Service,
}

impl Server {
    /// Open the store and build the engine and its asset connections.
    ///
    /// Connections with an invalid configuration are skipped.
    ///
    /// # Errors
    ///
    /// Returns error if the store or the initial model cannot be loaded, or if
    /// the provider registries are ambiguous.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let persistence = open_persistence(&config)?;
        let context: Arc<dyn ServiceContext> =
            Arc::new(PersistenceServiceContext::new(Arc::clone(&persistence)));
        let connections = build_connections(&config.asset_connections, &context);

        let service = Service::new(config.core, persistence, connections)
            .context("Failed to configure service")?;
        Ok(Self { service })
    }

    /// Run until Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns error if the shutdown signal cannot be awaited.
    pub async fn run(self) -> Result<()> {
        self.service.start().await;

        self.service
            .message_bus()
            .subscribe(SubscriptionInfo::all(), |message| {
                tracing::debug!(kind = ?message.kind(), element = %message.element(), "Event");
            })
            .context("Failed to subscribe event log")?;

        tracing::info!("Server running, press Ctrl+C to stop");
        let signal = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");

        self.service.stop().await;
        signal.context("Failed to listen for shutdown signal")
    }
}

fn open_persistence(config: &ServiceConfig) -> Result<Arc<dyn Persistence>> {
    let environment = match &config.persistence.initial_model {
        Some(path) => Some(load_environment(path)?),
        None => None,
    };

    match config.persistence.store_type {
        StoreType::Memory => {
            let environment = environment.unwrap_or_default();
            tracing::info!(
                shells = environment.shells.len(),
                submodels = environment.submodels.len(),
                "Using in-memory store"
            );
            Ok(Arc::new(MemoryPersistence::with_environment(environment)))
        }
        StoreType::Sqlite => {
            let db_path = &config.persistence.db_path;
            let store = SqlitePersistence::open(db_path)
                .with_context(|| format!("Failed to open SQLite database {}", db_path.display()))?;
            if let Some(environment) = environment {
                store
                    .import(&environment)
                    .context("Failed to import initial model")?;
            }
            tracing::info!(db_path = %db_path.display(), "Using SQLite store");
            Ok(Arc::new(store))
        }
    }
}

fn load_environment(path: &Path) -> Result<Environment> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read model {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid model {}", path.display()))
}

/// Build every configured connection, skipping those that fail validation.
fn build_connections(
    configs: &[AssetConnectionConfig],
    context: &Arc<dyn ServiceContext>,
) -> Vec<Arc<dyn AssetConnection>> {
    let mut connections: Vec<Arc<dyn AssetConnection>> = Vec::with_capacity(configs.len());
    for (index, config) in configs.iter().enumerate() {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| format!("{}-{index}", config.protocol.protocol()));
        match build_connection(&name, &config.protocol, context) {
            Ok(connection) => connections.push(connection),
            Err(err) => {
                tracing::warn!(connection = %name, error = %err, "Skipping asset connection");
            }
        }
    }
    connections
}

fn build_connection(
    name: &str,
    protocol: &ProtocolConfig,
    context: &Arc<dyn ServiceContext>,
) -> Result<Arc<dyn AssetConnection>, AssetConnectionError> {
    Ok(match protocol {
        ProtocolConfig::Mqtt(config) => Arc::new(MqttAssetConnection::new(
            name,
            config.clone(),
            Arc::clone(context),
        )?),
        ProtocolConfig::Http(config) => Arc::new(HttpAssetConnection::new(
            name,
            config.clone(),
            Arc::clone(context),
        )?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PersistenceConfig;
    use aas_assetsync_core::{KeyType, Reference, Submodel, SubmodelElement, TypedValue};
    use aas_assetsync_persistence::OutputModifier;

    fn model_file(dir: &Path) -> std::path::PathBuf {
        let mut submodel = Submodel::new("urn:example:sm:1");
        submodel.submodel_elements = vec![SubmodelElement::property(
            "Temperature",
            TypedValue::Double(21.5),
        )];
        let environment = Environment {
            shells: Vec::new(),
            submodels: vec![submodel],
        };
        let path = dir.join("model.json");
        std::fs::write(&path, serde_json::to_string(&environment).unwrap()).unwrap();
        path
    }

    fn temperature() -> Reference {
        Reference::submodel("urn:example:sm:1").child(KeyType::Property, "Temperature")
    }

    #[test]
    fn loads_initial_model_into_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig {
            persistence: PersistenceConfig {
                store_type: StoreType::Sqlite,
                db_path: dir.path().join("store.db"),
                initial_model: Some(model_file(dir.path())),
            },
            ..ServiceConfig::default()
        };

        let store = open_persistence(&config).unwrap();
        assert!(store.get(&temperature(), &OutputModifier::DEFAULT).is_ok());
    }

    #[test]
    fn invalid_connections_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config: ServiceConfig = serde_json::from_value(serde_json::json!({
            "persistence": { "initialModel": model_file(dir.path()) },
            "assetConnections": [
                { "type": "mqtt", "serverUri": "ws://broker:1883" },
                {
                    "type": "http",
                    "name": "device",
                    "valueProviders": {
                        "(Submodel)urn:example:sm:1, (Property)Temperature": { "path": "temperature" }
                    }
                }
            ]
        }))
        .unwrap();

        let store = open_persistence(&config).unwrap();
        let context: Arc<dyn ServiceContext> = Arc::new(PersistenceServiceContext::new(store));
        let connections = build_connections(&config.asset_connections, &context);
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].name(), "device");
        assert_eq!(connections[0].value_providers()[0].0, temperature());
    }

    #[test]
    fn missing_model_is_an_error() {
        let config = ServiceConfig {
            persistence: PersistenceConfig {
                initial_model: Some("/nonexistent/model.json".into()),
                ..PersistenceConfig::default()
            },
            ..ServiceConfig::default()
        };
        assert!(Server::new(config).is_err());
    }
}
