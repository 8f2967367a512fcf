//! MQTT client session and event loop.

use crate::config::{parse_server_uri, MqttAssetConnectionConfig};
use crate::topic::topic_matches;
use aas_assetsync_assetconnection::{content, AssetConnectionError, NewDataListener, ServiceContext};
use aas_assetsync_core::Reference;
use parking_lot::{Mutex, RwLock};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// An active subscription route.
struct Route {
    filter: String,
    query: Option<String>,
    listener: NewDataListener,
}

/// Shared state of one MQTT client session.
pub(crate) struct MqttSession {
    name: String,
    config: MqttAssetConnectionConfig,
    context: Arc<dyn ServiceContext>,
    client: RwLock<Option<AsyncClient>>,
    routes: RwLock<HashMap<Reference, Route>>,
    connected: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttSession {
    pub(crate) fn new(
        name: String,
        config: MqttAssetConnectionConfig,
        context: Arc<dyn ServiceContext>,
    ) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            name,
            config,
            context,
            client: RwLock::new(None),
            routes: RwLock::new(HashMap::new()),
            connected,
            task: Mutex::new(None),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Current client, if a session was started.
    pub(crate) fn client(&self) -> Option<AsyncClient> {
        self.client.read().clone()
    }

    /// Start the client and wait for the broker's `CONNACK`.
    pub(crate) async fn connect(self: &Arc<Self>) -> Result<(), AssetConnectionError> {
        if self.is_connected() {
            return Ok(());
        }

        let (host, port) = parse_server_uri(&self.config.server_uri)?;
        let mut options = MqttOptions::new(&self.config.client_id, host, port);
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs));
        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            options.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(options, 100);
        *self.client.write() = Some(client);

        let mut connected = self.connected.subscribe();
        let handle = tokio::spawn(run_event_loop(Arc::clone(self), eventloop));
        if let Some(previous) = self.task.lock().replace(handle) {
            previous.abort();
        }

        let wait = async {
            loop {
                if *connected.borrow_and_update() {
                    return true;
                }
                if connected.changed().await.is_err() {
                    return false;
                }
            }
        };
        let timeout = Duration::from_secs(self.config.connect_timeout_secs);
        if matches!(tokio::time::timeout(timeout, wait).await, Ok(true)) {
            return Ok(());
        }

        self.stop();
        Err(AssetConnectionError::Connection {
            connection: self.name.clone(),
            detail: format!(
                "no CONNACK from {} within {}s",
                self.config.server_uri, self.config.connect_timeout_secs
            ),
        })
    }

    /// Stop the event loop and drop the client.
    pub(crate) fn stop(&self) {
        if let Some(client) = self.client.write().take() {
            if let Err(e) = client.try_disconnect() {
                tracing::debug!(connection = %self.name, error = %e, "MQTT disconnect request failed");
            }
        }
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.connected.send_replace(false);
    }

    /// Register a route and subscribe its filter if the session is up.
    pub(crate) async fn subscribe(
        &self,
        reference: &Reference,
        filter: &str,
        query: Option<String>,
        listener: NewDataListener,
    ) -> Result<(), AssetConnectionError> {
        {
            let mut routes = self.routes.write();
            if routes.contains_key(reference) {
                return Err(AssetConnectionError::AlreadySubscribed(reference.clone()));
            }
            routes.insert(
                reference.clone(),
                Route {
                    filter: filter.to_string(),
                    query,
                    listener,
                },
            );
        }

        let Some(client) = self.client().filter(|_| self.is_connected()) else {
            tracing::debug!(reference = %reference, filter, "Deferring MQTT subscription until connected");
            return Ok(());
        };

        tracing::info!(reference = %reference, filter, "Subscribing to MQTT topic");
        if let Err(e) = client.subscribe(filter, QoS::AtLeastOnce).await {
            self.routes.write().remove(reference);
            return Err(AssetConnectionError::Io {
                reference: reference.clone(),
                detail: format!("subscribe {filter}: {e}"),
            });
        }
        Ok(())
    }

    /// Remove a route; unsubscribe its filter once no other route uses it.
    pub(crate) async fn unsubscribe(&self, reference: &Reference) -> Result<(), AssetConnectionError> {
        let filter = {
            let mut routes = self.routes.write();
            let Some(route) = routes.remove(reference) else {
                return Ok(());
            };
            if routes.values().any(|r| r.filter == route.filter) {
                return Ok(());
            }
            route.filter
        };

        if let Some(client) = self.client() {
            client
                .unsubscribe(&filter)
                .await
                .map_err(|e| AssetConnectionError::Io {
                    reference: reference.clone(),
                    detail: format!("unsubscribe {filter}: {e}"),
                })?;
        }
        Ok(())
    }

    pub(crate) fn is_subscribed(&self, reference: &Reference) -> bool {
        self.routes.read().contains_key(reference)
    }

    /// Deliver a received message to every matching route.
    fn dispatch(&self, topic: &str, payload: &[u8]) {
        let routes = self.routes.read();
        for (reference, route) in routes.iter().filter(|(_, r)| topic_matches(&r.filter, topic)) {
            let Some(type_info) = self.context.type_info(reference) else {
                tracing::warn!(reference = %reference, topic, "MQTT message for unknown element");
                continue;
            };
            match content::parse_payload(reference, payload, route.query.as_deref(), &type_info) {
                Ok(value) => {
                    route.listener.notify(value);
                }
                Err(err) => {
                    tracing::warn!(
                        reference = %reference,
                        topic,
                        payload_len = payload.len(),
                        error = %err,
                        "Failed to map MQTT message"
                    );
                }
            }
        }
    }

    /// Queue subscriptions for every route, used after each `CONNACK`.
    fn resubscribe(&self) {
        let Some(client) = self.client() else {
            return;
        };
        let mut filters: Vec<String> = self.routes.read().values().map(|r| r.filter.clone()).collect();
        filters.sort();
        filters.dedup();
        for filter in filters {
            if let Err(e) = client.try_subscribe(&filter, QoS::AtLeastOnce) {
                tracing::warn!(connection = %self.name, filter = %filter, error = %e, "MQTT resubscribe failed");
            }
        }
    }
}

async fn run_event_loop(session: Arc<MqttSession>, mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                tracing::debug!(
                    topic = %publish.topic,
                    payload_len = publish.payload.len(),
                    "Received MQTT message"
                );
                session.dispatch(&publish.topic, &publish.payload);
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!(connection = %session.name, "Connected to MQTT broker");
                session.connected.send_replace(true);
                session.resubscribe();
            }
            Ok(Event::Incoming(Packet::SubAck(_))) => {
                tracing::debug!(connection = %session.name, "Subscription acknowledged");
            }
            Ok(_) => {}
            Err(e) => {
                if session.connected.send_replace(false) {
                    tracing::warn!(connection = %session.name, error = %e, "MQTT asset connection lost");
                } else {
                    tracing::debug!(connection = %session.name, error = %e, "MQTT connection attempt failed");
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
