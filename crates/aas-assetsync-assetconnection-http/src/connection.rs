//! The HTTP asset connection.

use crate::client::HttpClient;
use crate::config::HttpAssetConnectionConfig;
use crate::provider::{HttpOperationProvider, HttpSubscriptionProvider, HttpValueProvider};
use aas_assetsync_assetconnection::connection::Providers;
use aas_assetsync_assetconnection::{
    AssetConnection, AssetConnectionError, AssetOperationProvider, AssetSubscriptionProvider,
    AssetValueProvider, ServiceContext,
};
use aas_assetsync_core::Reference;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Client and link state shared by the providers of one connection.
pub(crate) struct Endpoint {
    name: String,
    client: HttpClient,
    connected: AtomicBool,
}

impl Endpoint {
    /// The client, if the connection is up.
    pub(crate) fn client(&self, reference: &Reference) -> Result<HttpClient, AssetConnectionError> {
        if self.connected.load(Ordering::Acquire) {
            Ok(self.client.clone())
        } else {
            Err(AssetConnectionError::Io {
                reference: reference.clone(),
                detail: format!("connection {} is not connected", self.name),
            })
        }
    }
}

/// One HTTP endpoint and the providers it serves.
pub struct HttpAssetConnection {
    endpoint: Arc<Endpoint>,
    value_providers: Vec<(Reference, Arc<HttpValueProvider>)>,
    subscription_providers: Vec<(Reference, Arc<HttpSubscriptionProvider>)>,
    operation_providers: Vec<(Reference, Arc<HttpOperationProvider>)>,
}

impl HttpAssetConnection {
    /// Create a connection from its configuration. Does not connect yet.
    ///
    /// # Errors
    ///
    /// Returns [`AssetConnectionError::Configuration`] if the base URL or a
    /// header is malformed, a value or subscription provider names an element
    /// without a value, or an operation provider does not name an Operation.
    pub fn new(
        name: impl Into<String>,
        config: HttpAssetConnectionConfig,
        context: Arc<dyn ServiceContext>,
    ) -> Result<Self, AssetConnectionError> {
        let name = name.into();
        let client = HttpClient::new(&config)
            .map_err(|e| AssetConnectionError::Configuration(format!("HTTP connection {name}: {e}")))?;

        let references = config
            .value_providers
            .keys()
            .chain(config.subscription_providers.keys());
        for reference in references {
            if context.type_info(reference).is_none() {
                return Err(AssetConnectionError::Configuration(format!(
                    "HTTP provider of {name}: {reference} does not resolve to a value element"
                )));
            }
        }

        let endpoint = Arc::new(Endpoint {
            name: name.clone(),
            client,
            connected: AtomicBool::new(false),
        });

        let mut operation_providers = Vec::with_capacity(config.operation_providers.len());
        for (reference, provider) in config.operation_providers {
            let output_variables = context.operation_output_variables(&reference).ok_or_else(|| {
                AssetConnectionError::Configuration(format!(
                    "HTTP operation provider of {name}: {reference} does not resolve to an operation"
                ))
            })?;
            let provider = HttpOperationProvider::new(
                reference.clone(),
                provider,
                Arc::clone(&endpoint),
                output_variables,
            );
            operation_providers.push((reference, Arc::new(provider)));
        }

        let value_providers = config
            .value_providers
            .into_iter()
            .map(|(reference, provider)| {
                let provider = HttpValueProvider::new(
                    reference.clone(),
                    provider,
                    Arc::clone(&endpoint),
                    Arc::clone(&context),
                );
                (reference, Arc::new(provider))
            })
            .collect();
        let subscription_providers = config
            .subscription_providers
            .into_iter()
            .map(|(reference, provider)| {
                let provider = HttpSubscriptionProvider::new(
                    reference.clone(),
                    provider,
                    Arc::clone(&endpoint),
                    Arc::clone(&context),
                );
                (reference, Arc::new(provider))
            })
            .collect();

        Ok(Self {
            endpoint,
            value_providers,
            subscription_providers,
            operation_providers,
        })
    }
}

#[async_trait]
impl AssetConnection for HttpAssetConnection {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    async fn connect(&self) -> Result<(), AssetConnectionError> {
        self.endpoint.connected.store(true, Ordering::Release);
        tracing::info!(connection = %self.endpoint.name, "HTTP asset connection ready");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AssetConnectionError> {
        self.endpoint.connected.store(false, Ordering::Release);
        tracing::info!(connection = %self.endpoint.name, "HTTP asset connection closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.endpoint.connected.load(Ordering::Acquire)
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

    fn operation_providers(&self) -> Providers<dyn AssetOperationProvider> {
        self.operation_providers
            .iter()
            .map(|(reference, provider)| {
                let provider: Arc<dyn AssetOperationProvider> = provider.clone();
                (reference.clone(), provider)
            })
            .collect()
    }
}
