//! Aggregation of all configured asset connections.

use crate::connection::{AssetConnection, Providers};
use crate::error::AssetConnectionError;
use crate::provider::{
    AssetOperationProvider, AssetSubscriptionProvider, AssetValueProvider, NewData,
    NewDataListener,
};
use aas_assetsync_core::Reference;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Provider capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Get/set values
    Value,
    /// Pushed values
    Subscription,
    /// Remote procedures
    Operation,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Value => "value",
            Capability::Subscription => "subscription",
            Capability::Operation => "operation",
        };
        f.write_str(name)
    }
}

/// All configured asset connections and their provider registries.
///
/// Registries are built once in [`new`](Self::new) and immutable afterwards.
pub struct AssetConnectionManager {
    connections: Vec<Arc<dyn AssetConnection>>,
    value_providers: HashMap<Reference, Arc<dyn AssetValueProvider>>,
    subscription_providers: HashMap<Reference, Arc<dyn AssetSubscriptionProvider>>,
    operation_providers: HashMap<Reference, Arc<dyn AssetOperationProvider>>,
    active_subscriptions: Mutex<HashSet<Reference>>,
}

impl AssetConnectionManager {
    /// Build the provider registries of `connections`.
    ///
    /// # Errors
    ///
    /// Returns [`AssetConnectionError::Configuration`] if a reference is claimed
    /// twice for the same capability.
    pub fn new(connections: Vec<Arc<dyn AssetConnection>>) -> Result<Self, AssetConnectionError> {
        let mut value_providers = HashMap::new();
        let mut subscription_providers = HashMap::new();
        let mut operation_providers = HashMap::new();

        for connection in &connections {
            let name = connection.name();
            register(
                &mut value_providers,
                Capability::Value,
                name,
                connection.value_providers(),
            )?;
            register(
                &mut subscription_providers,
                Capability::Subscription,
                name,
                connection.subscription_providers(),
            )?;
            register(
                &mut operation_providers,
                Capability::Operation,
                name,
                connection.operation_providers(),
            )?;
        }

        tracing::info!(
            connections = connections.len(),
            value_providers = value_providers.len(),
            subscription_providers = subscription_providers.len(),
            operation_providers = operation_providers.len(),
            "Asset connections configured"
        );

        Ok(Self {
            connections,
            value_providers,
            subscription_providers,
            operation_providers,
            active_subscriptions: Mutex::new(HashSet::new()),
        })
    }

    /// A manager without connections.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            connections: Vec::new(),
            value_providers: HashMap::new(),
            subscription_providers: HashMap::new(),
            operation_providers: HashMap::new(),
            active_subscriptions: Mutex::new(HashSet::new()),
        }
    }

    /// Configured connections.
    #[must_use]
    pub fn connections(&self) -> &[Arc<dyn AssetConnection>] {
        &self.connections
    }

    /// Whether `reference` has a value provider.
    #[must_use]
    pub fn has_value_provider(&self, reference: &Reference) -> bool {
        self.value_providers.contains_key(reference)
    }

    /// Whether `reference` has a subscription provider.
    #[must_use]
    pub fn has_subscription_provider(&self, reference: &Reference) -> bool {
        self.subscription_providers.contains_key(reference)
    }

    /// Whether `reference` has an operation provider.
    #[must_use]
    pub fn has_operation_provider(&self, reference: &Reference) -> bool {
        self.operation_providers.contains_key(reference)
    }

    /// Value provider of `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`AssetConnectionError::NotConfigured`] if there is none.
    pub fn get_value_provider(
        &self,
        reference: &Reference,
    ) -> Result<Arc<dyn AssetValueProvider>, AssetConnectionError> {
        lookup(&self.value_providers, reference, Capability::Value)
    }

    /// Subscription provider of `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`AssetConnectionError::NotConfigured`] if there is none.
    pub fn get_subscription_provider(
        &self,
        reference: &Reference,
    ) -> Result<Arc<dyn AssetSubscriptionProvider>, AssetConnectionError> {
        lookup(&self.subscription_providers, reference, Capability::Subscription)
    }

    /// Operation provider of `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`AssetConnectionError::NotConfigured`] if there is none.
    pub fn get_operation_provider(
        &self,
        reference: &Reference,
    ) -> Result<Arc<dyn AssetOperationProvider>, AssetConnectionError> {
        lookup(&self.operation_providers, reference, Capability::Operation)
    }

    /// Connect every connection, continuing past failures.
    ///
    /// # Errors
    ///
    /// Returns the failures of all connections that could not connect.
    pub async fn init(&self) -> Result<(), AssetConnectionError> {
        let mut errors = Vec::new();
        for connection in &self.connections {
            match connection.connect().await {
                Ok(()) => tracing::info!(connection = connection.name(), "Asset connection established"),
                Err(err) => {
                    tracing::warn!(connection = connection.name(), error = %err, "Asset connection failed");
                    errors.push(err);
                }
            }
        }
        AssetConnectionError::collect(errors)
    }

    /// Subscribe every subscription provider, feeding `tx`.
    ///
    /// # Errors
    ///
    /// Returns the failures of all subscriptions that could not be started.
    pub async fn subscribe_all(
        &self,
        tx: &mpsc::Sender<NewData>,
    ) -> Result<(), AssetConnectionError> {
        let mut errors = Vec::new();
        for reference in self.subscription_providers.keys() {
            if let Err(err) = self.subscribe(reference, tx.clone()).await {
                tracing::warn!(reference = %reference, error = %err, "Subscription failed");
                errors.push(err);
            }
        }
        AssetConnectionError::collect(errors)
    }

    /// Subscribe the provider of `reference`, feeding `tx`.
    ///
    /// # Errors
    ///
    /// Returns [`AssetConnectionError::AlreadySubscribed`] if active, or the provider's error.
    pub async fn subscribe(
        &self,
        reference: &Reference,
        tx: mpsc::Sender<NewData>,
    ) -> Result<(), AssetConnectionError> {
        let provider = self.get_subscription_provider(reference)?;
        if !self.active_subscriptions.lock().insert(reference.clone()) {
            return Err(AssetConnectionError::AlreadySubscribed(reference.clone()));
        }
        if let Err(err) = provider
            .subscribe(NewDataListener::new(reference.clone(), tx))
            .await
        {
            self.active_subscriptions.lock().remove(reference);
            return Err(err);
        }
        tracing::debug!(reference = %reference, "Subscribed");
        Ok(())
    }

    /// Whether a subscription is active for `reference`.
    #[must_use]
    pub fn is_subscribed(&self, reference: &Reference) -> bool {
        self.active_subscriptions.lock().contains(reference)
    }

    /// Unsubscribe `reference`. A no-op without an active subscription.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    pub async fn unsubscribe(&self, reference: &Reference) -> Result<(), AssetConnectionError> {
        if !self.active_subscriptions.lock().remove(reference) {
            return Ok(());
        }
        let provider = self.get_subscription_provider(reference)?;
        provider.unsubscribe().await?;
        tracing::debug!(reference = %reference, "Unsubscribed");
        Ok(())
    }

    /// Unsubscribe everything, then disconnect every connection.
    ///
    /// Continues past failures so that no connection is leaked.
    ///
    /// # Errors
    ///
    /// Returns every failure encountered.
    pub async fn close(&self) -> Result<(), AssetConnectionError> {
        let mut errors = Vec::new();

        let active: Vec<Reference> = self.active_subscriptions.lock().iter().cloned().collect();
        for reference in &active {
            if let Err(err) = self.unsubscribe(reference).await {
                tracing::warn!(reference = %reference, error = %err, "Unsubscribe failed");
                errors.push(err);
            }
        }

        for connection in &self.connections {
            if let Err(err) = connection.disconnect().await {
                tracing::warn!(connection = connection.name(), error = %err, "Disconnect failed");
                errors.push(err);
            }
        }

        tracing::info!(connections = self.connections.len(), "Asset connections closed");
        AssetConnectionError::collect(errors)
    }
}

fn register<P: ?Sized>(
    registry: &mut HashMap<Reference, Arc<P>>,
    capability: Capability,
    connection: &str,
    providers: Providers<P>,
) -> Result<(), AssetConnectionError> {
    for (reference, provider) in providers {
        if registry.contains_key(&reference) {
            return Err(AssetConnectionError::Configuration(format!(
                "{capability} provider for {reference} is configured more than once (again in connection {connection})"
            )));
        }
        registry.insert(reference, provider);
    }
    Ok(())
}

fn lookup<P: ?Sized>(
    registry: &HashMap<Reference, Arc<P>>,
    reference: &Reference,
    capability: Capability,
) -> Result<Arc<P>, AssetConnectionError> {
    registry
        .get(reference)
        .cloned()
        .ok_or_else(|| AssetConnectionError::NotConfigured {
            reference: reference.clone(),
            capability,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aas_assetsync_core::{ElementValue, KeyType, TypedValue};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn reference(name: &str) -> Reference {
        Reference::submodel("urn:sm").child(KeyType::Property, name)
    }

    struct Constant(ElementValue);

    #[async_trait]
    impl AssetValueProvider for Constant {
        async fn get_value(&self) -> Result<ElementValue, AssetConnectionError> {
            Ok(self.0.clone())
        }

        async fn set_value(&self, _value: ElementValue) -> Result<(), AssetConnectionError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Subscription {
        active: AtomicBool,
        unsubscribe_calls: AtomicUsize,
        fail_unsubscribe: bool,
    }

    #[async_trait]
    impl AssetSubscriptionProvider for Subscription {
        async fn subscribe(&self, _listener: NewDataListener) -> Result<(), AssetConnectionError> {
            self.active.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn unsubscribe(&self) -> Result<(), AssetConnectionError> {
            self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
            self.active.store(false, Ordering::SeqCst);
            if self.fail_unsubscribe {
                return Err(AssetConnectionError::Io {
                    reference: reference("S"),
                    detail: "broker gone".to_string(),
                });
            }
            Ok(())
        }

        fn is_subscribed(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }
    }

    struct Fake {
        name: String,
        values: Vec<Reference>,
        subscription: Option<(Reference, Arc<Subscription>)>,
        fail_disconnect: bool,
        disconnected: AtomicBool,
    }

    impl Fake {
        fn new(name: &str, values: Vec<Reference>) -> Self {
            Self {
                name: name.to_string(),
                values,
                subscription: None,
                fail_disconnect: false,
                disconnected: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl AssetConnection for Fake {
        fn name(&self) -> &str {
            &self.name
        }

        async fn connect(&self) -> Result<(), AssetConnectionError> {
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), AssetConnectionError> {
            self.disconnected.store(true, Ordering::SeqCst);
            if self.fail_disconnect {
                return Err(AssetConnectionError::Connection {
                    connection: self.name.clone(),
                    detail: "socket error".to_string(),
                });
            }
            Ok(())
        }

        fn is_connected(&self) -> bool {
            !self.disconnected.load(Ordering::SeqCst)
        }

        fn value_providers(&self) -> Providers<dyn AssetValueProvider> {
            self.values
                .iter()
                .map(|r| {
                    let provider: Arc<dyn AssetValueProvider> =
                        Arc::new(Constant(ElementValue::Property(Some(TypedValue::Double(3.3)))));
                    (r.clone(), provider)
                })
                .collect()
        }

        fn subscription_providers(&self) -> Providers<dyn AssetSubscriptionProvider> {
            self.subscription
                .iter()
                .map(|(r, p)| {
                    let provider: Arc<dyn AssetSubscriptionProvider> = p.clone();
                    (r.clone(), provider)
                })
                .collect()
        }
    }

    #[test]
    fn duplicate_registration_is_a_configuration_error() {
        let a: Arc<dyn AssetConnection> = Arc::new(Fake::new("a", vec![reference("X")]));
        let b: Arc<dyn AssetConnection> = Arc::new(Fake::new("b", vec![reference("X")]));
        let result = AssetConnectionManager::new(vec![a, b]);
        assert!(matches!(
            result,
            Err(AssetConnectionError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn missing_provider_is_not_configured() {
        let a: Arc<dyn AssetConnection> = Arc::new(Fake::new("a", vec![reference("X")]));
        let manager = AssetConnectionManager::new(vec![a]).unwrap();

        assert!(manager.has_value_provider(&reference("X")));
        assert!(!manager.has_value_provider(&reference("Y")));
        assert!(!manager.has_operation_provider(&reference("X")));

        let provider = assert_ok!(manager.get_value_provider(&reference("X")));
        assert_eq!(
            provider.get_value().await.unwrap(),
            ElementValue::Property(Some(TypedValue::Double(3.3)))
        );

        let Err(err) = manager.get_value_provider(&reference("Y")) else {
            panic!("expected NotConfigured");
        };
        assert!(matches!(
            err,
            AssetConnectionError::NotConfigured {
                capability: Capability::Value,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let subscription = Arc::new(Subscription::default());
        let mut fake = Fake::new("a", vec![]);
        fake.subscription = Some((reference("S"), subscription.clone()));
        let manager = AssetConnectionManager::new(vec![Arc::new(fake)]).unwrap();
        let (tx, _rx) = mpsc::channel(8);

        assert_ok!(manager.subscribe_all(&tx).await);
        assert!(manager.is_subscribed(&reference("S")));
        assert!(matches!(
            manager.subscribe(&reference("S"), tx.clone()).await,
            Err(AssetConnectionError::AlreadySubscribed(_))
        ));

        assert_ok!(manager.unsubscribe(&reference("S")).await);
        assert_ok!(manager.unsubscribe(&reference("S")).await);
        assert_eq!(subscription.unsubscribe_calls.load(Ordering::SeqCst), 1);
        assert!(!subscription.is_subscribed());
    }

    #[tokio::test]
    async fn close_continues_past_failures() {
        let subscription = Arc::new(Subscription {
            fail_unsubscribe: true,
            ..Subscription::default()
        });
        let mut failing = Fake::new("failing", vec![]);
        failing.fail_disconnect = true;
        failing.subscription = Some((reference("S"), subscription.clone()));
        let failing = Arc::new(failing);
        let healthy = Arc::new(Fake::new("healthy", vec![reference("X")]));

        let manager = AssetConnectionManager::new(vec![
            failing.clone() as Arc<dyn AssetConnection>,
            healthy.clone() as Arc<dyn AssetConnection>,
        ])
        .unwrap();
        let (tx, _rx) = mpsc::channel(8);
        manager.subscribe_all(&tx).await.unwrap();

        let err = assert_err!(manager.close().await);
        let AssetConnectionError::Aggregate(errors) = err else {
            panic!("expected aggregate error");
        };
        assert_eq!(errors.len(), 2);
        assert!(!healthy.is_connected());
        assert!(!failing.is_connected());
        assert!(!manager.is_subscribed(&reference("S")));
    }
}
