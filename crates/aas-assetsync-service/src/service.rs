//! The service facade wiring store, connections, bus and handlers together.

use crate::context::RequestContext;
use crate::error::ServiceError;
use crate::messagebus::MessageBus;
use crate::request::{Request, RequestHandlerManager};
use crate::response::{Response, ResponsePayload};
use crate::sync::run_subscription_pump;
use aas_assetsync_assetconnection::{AssetConnection, AssetConnectionManager};
use aas_assetsync_persistence::Persistence;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    /// Capacity of the queue between subscription providers and the pump
    pub subscription_buffer: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            subscription_buffer: 256,
        }
    }
}

/// A running engine instance.
pub struct Service {
    config: CoreConfig,
    handlers: RequestHandlerManager,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Service {
    /// Assemble a service over `persistence` and `connections`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Configuration`] if the provider registries are ambiguous.
    pub fn new(
        config: CoreConfig,
        persistence: Arc<dyn Persistence>,
        connections: Vec<Arc<dyn AssetConnection>>,
    ) -> Result<Self, ServiceError> {
        if config.subscription_buffer == 0 {
            return Err(ServiceError::Configuration(
                "subscriptionBuffer must be positive".to_string(),
            ));
        }
        let assets = AssetConnectionManager::new(connections)
            .map_err(|err| ServiceError::Configuration(err.to_string()))?;
        let context = RequestContext::new(persistence, MessageBus::new(), Arc::new(assets));
        Ok(Self {
            config,
            handlers: RequestHandlerManager::new(context),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Connect the assets and start the background tasks.
    ///
    /// Connection and subscription failures are logged and do not stop the
    /// service; the affected elements are served from the store.
    pub async fn start(&self) {
        let ctx = self.handlers.context().clone();
        let mut tasks = Vec::new();
        if let Some(task) = ctx.operations().start() {
            tasks.push(task);
        }

        if let Err(err) = ctx.asset_connections().init().await {
            tracing::warn!(error = %err, "Some asset connections failed to connect");
        }

        let (tx, rx) = mpsc::channel(self.config.subscription_buffer);
        tasks.push(tokio::spawn(run_subscription_pump(ctx.clone(), rx)));
        if let Err(err) = ctx.asset_connections().subscribe_all(&tx).await {
            tracing::warn!(error = %err, "Some subscriptions failed to start");
        }

        self.tasks.lock().extend(tasks);
        tracing::info!("Service started");
    }

    /// Unsubscribe and disconnect the assets, then stop the background tasks.
    pub async fn stop(&self) {
        let ctx = self.handlers.context();
        if let Err(err) = ctx.asset_connections().close().await {
            tracing::warn!(error = %err, "Asset connections did not close cleanly");
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        ctx.message_bus().close();
        tracing::info!("Service stopped");
    }

    /// Handle one request.
    pub async fn execute(&self, request: Request) -> Response<ResponsePayload> {
        self.handlers.execute(request).await
    }

    /// The bus events are published on.
    #[must_use]
    pub fn message_bus(&self) -> &MessageBus {
        self.handlers.context().message_bus()
    }

    /// The shared handler context.
    #[must_use]
    pub fn context(&self) -> &RequestContext {
        self.handlers.context()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aas_assetsync_assetconnection::connection::Providers;
    use aas_assetsync_assetconnection::{AssetConnectionError, AssetValueProvider};
    use aas_assetsync_core::{ElementValue, EventMessage, KeyType, Reference, Submodel};
    use aas_assetsync_persistence::MemoryPersistence;
    use async_trait::async_trait;
    use tokio_test::assert_ok;

    struct Fixed;

    #[async_trait]
    impl AssetValueProvider for Fixed {
        async fn get_value(&self) -> Result<ElementValue, AssetConnectionError> {
            Ok(ElementValue::Property(None))
        }

        async fn set_value(&self, _value: ElementValue) -> Result<(), AssetConnectionError> {
            Ok(())
        }
    }

    struct Claims(&'static str);

    #[async_trait]
    impl AssetConnection for Claims {
        fn name(&self) -> &str {
            self.0
        }

        async fn connect(&self) -> Result<(), AssetConnectionError> {
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), AssetConnectionError> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }

        fn value_providers(&self) -> Providers<dyn AssetValueProvider> {
            let reference = Reference::submodel("urn:example:sm:1").child(KeyType::Property, "A");
            vec![(reference, Arc::new(Fixed) as Arc<dyn AssetValueProvider>)]
        }
    }

    fn store() -> Arc<dyn Persistence> {
        Arc::new(MemoryPersistence::new())
    }

    #[test]
    fn config_defaults_and_names() {
        let config: CoreConfig = assert_ok!(serde_json::from_str("{}"));
        assert_eq!(config, CoreConfig::default());
        let config: CoreConfig = assert_ok!(serde_json::from_str(r#"{"subscriptionBuffer": 8}"#));
        assert_eq!(config.subscription_buffer, 8);
    }

    #[test]
    fn ambiguous_providers_are_rejected() {
        let connections: Vec<Arc<dyn AssetConnection>> =
            vec![Arc::new(Claims("first")), Arc::new(Claims("second"))];
        let result = Service::new(CoreConfig::default(), store(), connections);
        assert!(matches!(result, Err(ServiceError::Configuration(_))));
    }

    #[test]
    fn zero_buffer_is_rejected() {
        let config = CoreConfig {
            subscription_buffer: 0,
        };
        assert!(Service::new(config, store(), Vec::new()).is_err());
    }

    #[tokio::test]
    async fn start_and_stop_without_connections() {
        let Ok(service) = Service::new(CoreConfig::default(), store(), Vec::new()) else {
            panic!("empty configuration is valid");
        };
        service.start().await;
        assert_eq!(service.tasks.lock().len(), 2);
        service.stop().await;
        assert!(service.tasks.lock().is_empty());
        let message = EventMessage::ElementDelete {
            element: Reference::submodel("urn:example:sm:1"),
            value: Submodel::new("urn:example:sm:1").into(),
        };
        assert!(service.message_bus().publish(message).is_err());
    }
}
