//! MQTT value and subscription providers.

use crate::config::{MqttSubscriptionProviderConfig, MqttValueProviderConfig};
use crate::session::MqttSession;
use aas_assetsync_assetconnection::{
    content, AssetConnectionError, AssetSubscriptionProvider, AssetValueProvider, NewDataListener,
};
use aas_assetsync_core::{ElementValue, Reference};
use async_trait::async_trait;
use rumqttc::QoS;
use std::sync::Arc;

/// Publishes values written to an element.
///
/// MQTT has no request/response, so reading is not supported.
pub struct MqttValueProvider {
    reference: Reference,
    config: MqttValueProviderConfig,
    session: Arc<MqttSession>,
}

impl MqttValueProvider {
    pub(crate) fn new(
        reference: Reference,
        config: MqttValueProviderConfig,
        session: Arc<MqttSession>,
    ) -> Self {
        Self {
            reference,
            config,
            session,
        }
    }
}

#[async_trait]
impl AssetValueProvider for MqttValueProvider {
    async fn get_value(&self) -> Result<ElementValue, AssetConnectionError> {
        Err(AssetConnectionError::Unsupported(format!(
            "MQTT value provider for {} is write-only",
            self.reference
        )))
    }

    async fn set_value(&self, value: ElementValue) -> Result<(), AssetConnectionError> {
        let client = self
            .session
            .client()
            .filter(|_| self.session.is_connected())
            .ok_or_else(|| AssetConnectionError::Io {
                reference: self.reference.clone(),
                detail: format!("connection {} is not connected", self.session.name()),
            })?;

        let payload = content::render_payload(&value, self.config.template.as_deref());
        tracing::debug!(
            reference = %self.reference,
            topic = %self.config.topic,
            payload_len = payload.len(),
            "Publishing value"
        );

        client
            .publish(
                &self.config.topic,
                QoS::AtLeastOnce,
                self.config.retain,
                payload.into_bytes(),
            )
            .await
            .map_err(|e| AssetConnectionError::Io {
                reference: self.reference.clone(),
                detail: format!("publish {}: {e}", self.config.topic),
            })
    }
}

/// Delivers messages on a topic filter as element values.
pub struct MqttSubscriptionProvider {
    reference: Reference,
    config: MqttSubscriptionProviderConfig,
    session: Arc<MqttSession>,
}

impl MqttSubscriptionProvider {
    pub(crate) fn new(
        reference: Reference,
        config: MqttSubscriptionProviderConfig,
        session: Arc<MqttSession>,
    ) -> Self {
        Self {
            reference,
            config,
            session,
        }
    }
}

#[async_trait]
impl AssetSubscriptionProvider for MqttSubscriptionProvider {
    async fn subscribe(&self, listener: NewDataListener) -> Result<(), AssetConnectionError> {
        self.session
            .subscribe(
                &self.reference,
                &self.config.topic,
                self.config.query.clone(),
                listener,
            )
            .await
    }

    async fn unsubscribe(&self) -> Result<(), AssetConnectionError> {
        self.session.unsubscribe(&self.reference).await
    }

    fn is_subscribed(&self) -> bool {
        self.session.is_subscribed(&self.reference)
    }
}
