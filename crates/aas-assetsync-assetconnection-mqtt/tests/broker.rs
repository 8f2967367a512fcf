//! Round trip through a live broker.
//!
//! Runs only when `AASSYNC_INTEGRATION` is set. The broker defaults to
//! `tcp://localhost:1883` and can be changed with `AASSYNC_MQTT_BROKER`.

use aas_assetsync_assetconnection::{AssetConnection, NewDataListener, ServiceContext};
use aas_assetsync_assetconnection_mqtt::{
    MqttAssetConnection, MqttAssetConnectionConfig, MqttSubscriptionProviderConfig,
    MqttValueProviderConfig,
};
use aas_assetsync_core::{
    DataType, ElementValue, KeyType, Reference, SubmodelElement, TypeInfo, TypedValue,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct Model;

impl ServiceContext for Model {
    fn type_info(&self, _reference: &Reference) -> Option<TypeInfo> {
        Some(TypeInfo::Property(DataType::Double))
    }

    fn operation_output_variables(&self, _reference: &Reference) -> Option<Vec<SubmodelElement>> {
        None
    }
}

fn enabled() -> bool {
    std::env::var("AASSYNC_INTEGRATION").is_ok()
}

#[tokio::test]
async fn published_value_is_received_by_subscription() {
    if !enabled() {
        return;
    }

    let topic = format!("aassync/test/{}", uuid::Uuid::new_v4());
    let setpoint = Reference::submodel("urn:sm").child(KeyType::Property, "Setpoint");
    let reading = Reference::submodel("urn:sm").child(KeyType::Property, "Reading");

    let mut config = MqttAssetConnectionConfig {
        client_id: format!("aassync-test-{}", uuid::Uuid::new_v4()),
        ..MqttAssetConnectionConfig::default()
    };
    if let Ok(broker) = std::env::var("AASSYNC_MQTT_BROKER") {
        config.server_uri = broker;
    }
    config.value_providers.insert(
        setpoint.clone(),
        MqttValueProviderConfig {
            topic: topic.clone(),
            template: Some(r#"{"reading": ${value}}"#.to_string()),
            retain: false,
        },
    );
    config.subscription_providers.insert(
        reading.clone(),
        MqttSubscriptionProviderConfig {
            topic: topic.clone(),
            query: Some("/reading".to_string()),
        },
    );

    let connection = MqttAssetConnection::new("broker", config, Arc::new(Model)).unwrap();
    connection.connect().await.unwrap();
    assert!(connection.is_connected());

    let (tx, mut rx) = mpsc::channel(8);
    let (_, subscription) = connection.subscription_providers().pop().unwrap();
    subscription
        .subscribe(NewDataListener::new(reading.clone(), tx))
        .await
        .unwrap();
    assert!(subscription.is_subscribed());
    tokio::time::sleep(Duration::from_millis(200)).await;

    let (_, value_provider) = connection.value_providers().pop().unwrap();
    value_provider
        .set_value(ElementValue::Property(Some(TypedValue::Double(21.5))))
        .await
        .unwrap();

    let data = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(data.reference, reading);
    assert_eq!(
        data.value,
        ElementValue::Property(Some(TypedValue::Double(21.5)))
    );

    subscription.unsubscribe().await.unwrap();
    assert!(!subscription.is_subscribed());
    connection.disconnect().await.unwrap();
    assert!(!connection.is_connected());
}
