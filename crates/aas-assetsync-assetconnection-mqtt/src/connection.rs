//! The MQTT asset connection.

use crate::config::{parse_server_uri, MqttAssetConnectionConfig};
use crate::provider::{MqttSubscriptionProvider, MqttValueProvider};
use crate::session::MqttSession;
use aas_assetsync_assetconnection::connection::Providers;
use aas_assetsync_assetconnection::{
    AssetConnection, AssetConnectionError, AssetSubscriptionProvider, AssetValueProvider,
    ServiceContext,
};
use aas_assetsync_core::Reference;
use async_trait::async_trait;
use std::sync::Arc;

/// One MQTT client session and the providers it serves.
pub struct MqttAssetConnection {
    session: Arc<MqttSession>,
    value_providers: Vec<(Reference, Arc<MqttValueProvider>)>,
    subscription_providers: Vec<(Reference, Arc<MqttSubscriptionProvider>)>,
}

impl MqttAssetConnection {
    /// Create a connection from its configuration. Does not connect yet.
    ///
    /// # Errors
    ///
    /// Returns [`AssetConnectionError::Configuration`] if the server URI is
    /// malformed or a subscribed element does not exist in the model.
    pub fn new(
        name: impl Into<String>,
        config: MqttAssetConnectionConfig,
        context: Arc<dyn ServiceContext>,
    ) -> Result<Self, AssetConnectionError> {
        let name = name.into();
        parse_server_uri(&config.server_uri)?;

        for reference in config.subscription_providers.keys() {
            if context.type_info(reference).is_none() {
                return Err(AssetConnectionError::Configuration(format!(
                    "MQTT subscription provider of {name}: {reference} does not resolve to a value element"
                )));
            }
        }

        let session = Arc::new(MqttSession::new(name, config.clone(), context));

        let value_providers = config
            .value_providers
            .into_iter()
            .map(|(reference, provider)| {
                let provider =
                    MqttValueProvider::new(reference.clone(), provider, Arc::clone(&session));
                (reference, Arc::new(provider))
            })
            .collect();
        let subscription_providers = config
            .subscription_providers
            .into_iter()
            .map(|(reference, provider)| {
                let provider =
                    MqttSubscriptionProvider::new(reference.clone(), provider, Arc::clone(&session));
                (reference, Arc::new(provider))
            })
            .collect();

        Ok(Self {
            session,
            value_providers,
            subscription_providers,
        })
    }
}

#[async_trait]
impl AssetConnection for MqttAssetConnection {
    fn name(&self) -> &str {
        self.session.name()
    }

    async fn connect(&self) -> Result<(), AssetConnectionError> {
        self.session.connect().await
    }

    async fn disconnect(&self) -> Result<(), AssetConnectionError> {
        self.session.stop();
        tracing::info!(connection = self.session.name(), "Disconnected from MQTT broker");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    fn value_providers(&self) -> Providers<dyn AssetValueProvider> {
        self.value_providers
            .iter()
            .map(|(reference, provider)| {
                let provider: Arc<dyn AssetValueProvider> = provider.clone();
                (reference.clone(), provider)
            })
            .collect()
    }

    fn subscription_providers(&self) -> Providers<dyn AssetSubscriptionProvider> {
        self.subscription_providers
            .iter()
            .map(|(reference, provider)| {
                let provider: Arc<dyn AssetSubscriptionProvider> = provider.clone();
                (reference.clone(), provider)
            })
            .collect()
    }
}
