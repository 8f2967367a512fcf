//! # AAS-AssetSync MQTT Asset Connection
//!
//! Connects model elements to topics on an MQTT broker.
//!
//! - Value providers publish rendered values to a topic (write-only)
//! - Subscription providers map messages on a topic filter to element values
//!
//! One [`MqttAssetConnection`] owns one client session. The session's event
//! loop runs on its own task, reconnects on failure and re-subscribes every
//! active topic filter after each `CONNACK`.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod connection;
mod provider;
mod session;
mod topic;

pub use config::{
    parse_server_uri, MqttAssetConnectionConfig, MqttSubscriptionProviderConfig,
    MqttValueProviderConfig,
};
pub use connection::MqttAssetConnection;
pub use provider::{MqttSubscriptionProvider, MqttValueProvider};
pub use topic::topic_matches;
