//! Read-through, recursive synchronization and the subscription pump.

mod common;

use aas_assetsync_core::{ElementValue, EventKind, EventMessage, TypedValue};
use aas_assetsync_persistence::OutputModifier;
use aas_assetsync_service::{
    GetAllSubmodelElementsRequest, GetSubmodelByIdRequest, GetSubmodelElementByPathRequest,
    Request, ResponsePayload, SetSubmodelElementValueByPathRequest, StatusCode,
    SubscriptionInfo,
};
use common::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn get_submodel() -> Request {
    Request::GetSubmodelById(GetSubmodelByIdRequest {
        id: SUBMODEL_ID.to_string(),
        modifier: OutputModifier::default(),
    })
}

fn updates(messages: &[EventMessage]) -> Vec<&EventMessage> {
    messages
        .iter()
        .filter(|m| m.kind() == EventKind::ElementUpdate)
        .collect()
}

#[tokio::test]
async fn only_changed_values_are_written_and_announced() {
    let store = CountingPersistence::new(environment());
    let a = MockValueProvider::new(double(1.0));
    let b = MockValueProvider::new(double(2.5));
    let connection = TestConnection::new("test")
        .with_value(property("A"), a.clone())
        .with_value(property("B"), b.clone());
    let service = start(store.clone(), connection).await;
    let (_, mut rx) = service
        .message_bus()
        .subscribe_channel(SubscriptionInfo::all())
        .unwrap();

    let response = service.execute(get_submodel()).await;
    let ResponsePayload::Submodel(submodel) = payload(response) else {
        panic!("expected a submodel");
    };

    assert_eq!(a.reads.load(Ordering::SeqCst), 1);
    assert_eq!(b.reads.load(Ordering::SeqCst), 1);
    assert_eq!(store.put_count(), 1);
    assert_eq!(store.stored_value(&property("A")), double(1.0));
    assert_eq!(store.stored_value(&property("B")), double(2.5));
    assert_eq!(submodel.submodel_elements[1].to_value().unwrap(), double(2.5));

    let messages = drain(&mut rx);
    let updates = updates(&messages);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].element(), &property("B"));
}

#[tokio::test]
async fn equal_asset_values_cause_no_writes_or_events() {
    let store = CountingPersistence::new(environment());
    let connection = TestConnection::new("test")
        .with_value(property("A"), MockValueProvider::new(double(1.0)))
        .with_value(nested("Speed"), MockValueProvider::new(double(10.0)));
    let service = start(store.clone(), connection).await;
    let (_, mut rx) = service
        .message_bus()
        .subscribe_channel(SubscriptionInfo::kinds([EventKind::ElementUpdate]))
        .unwrap();

    for _ in 0..3 {
        payload(service.execute(get_submodel()).await);
    }

    assert_eq!(store.put_count(), 0);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn synchronization_continues_after_nested_collections() {
    let store = CountingPersistence::new(environment());
    let connection = TestConnection::new("test")
        .with_value(nested("Speed"), MockValueProvider::new(double(12.0)))
        .with_value(property("C"), MockValueProvider::new(double(3.5)));
    let service = start(store.clone(), connection).await;

    let response = service
        .execute(Request::GetAllSubmodelElements(GetAllSubmodelElementsRequest {
            submodel_id: SUBMODEL_ID.to_string(),
            modifier: OutputModifier::default(),
        }))
        .await;
    assert_eq!(response.status_code, StatusCode::Success);

    assert_eq!(store.stored_value(&nested("Speed")), double(12.0));
    assert_eq!(store.stored_value(&property("C")), double(3.5));
    assert_eq!(store.put_count(), 2);
}

#[tokio::test]
async fn read_through_refreshes_a_single_element() {
    let store = CountingPersistence::new(environment());
    let provider = MockValueProvider::new(double(7.0));
    let connection = TestConnection::new("test").with_value(property("A"), provider.clone());
    let service = start(store.clone(), connection).await;
    let (_, mut rx) = service
        .message_bus()
        .subscribe_channel(SubscriptionInfo::all().below(property("A")))
        .unwrap();

    let element = element_payload(
        service
            .execute(Request::GetSubmodelElementByPath(GetSubmodelElementByPathRequest {
                reference: property("A"),
                modifier: OutputModifier::default(),
            }))
            .await,
    );

    assert_eq!(element.to_value().unwrap(), double(7.0));
    assert_eq!(store.stored_value(&property("A")), double(7.0));
    let kinds: Vec<EventKind> = drain(&mut rx).iter().map(EventMessage::kind).collect();
    assert_eq!(kinds, vec![EventKind::ElementUpdate, EventKind::ElementRead]);
}

#[tokio::test]
async fn provider_failure_is_a_server_error_not_a_stale_read() {
    let store = CountingPersistence::new(environment());
    let connection = TestConnection::new("test").with_value(
        property("A"),
        Arc::new(UnreachableValueProvider {
            reference: property("A"),
        }),
    );
    let service = start(store.clone(), connection).await;

    let response = service
        .execute(Request::GetSubmodelElementByPath(GetSubmodelElementByPathRequest {
            reference: property("A"),
            modifier: OutputModifier::default(),
        }))
        .await;

    assert_eq!(response.status_code, StatusCode::ServerInternalError);
    assert!(response.payload.is_none());
    assert!(response.message.unwrap().contains("connection refused"));
}

#[tokio::test]
async fn elements_without_providers_are_served_from_the_store() {
    let store = CountingPersistence::new(environment());
    let service = start(store.clone(), TestConnection::new("empty")).await;

    let element = element_payload(
        service
            .execute(Request::GetSubmodelElementByPath(GetSubmodelElementByPathRequest {
                reference: property("B"),
                modifier: OutputModifier::default(),
            }))
            .await,
    );
    assert_eq!(element.to_value().unwrap(), double(2.0));

    let response = service
        .execute(Request::SetSubmodelElementValueByPath(
            SetSubmodelElementValueByPathRequest {
                reference: property("B"),
                value: double(5.0),
            },
        ))
        .await;
    assert_eq!(response.status_code, StatusCode::SuccessNoContent);
    assert_eq!(store.stored_value(&property("B")), double(5.0));
}

#[tokio::test]
async fn pushed_values_update_the_store_in_order() {
    let store = CountingPersistence::new(environment());
    let push = Arc::new(PushSubscriptionProvider::default());
    let connection = TestConnection::new("test").with_subscription(property("A"), push.clone());
    let service = start(store.clone(), connection).await;
    let (_, mut rx) = service
        .message_bus()
        .subscribe_channel(SubscriptionInfo::all())
        .unwrap();
    assert!(service.context().asset_connections().is_subscribed(&property("A")));

    assert!(push.push(double(4.0)));
    let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        first,
        EventMessage::ValueChange {
            element: property("A"),
            old_value: Some(double(1.0)),
            new_value: double(4.0),
        }
    );
    assert_eq!(second.kind(), EventKind::ElementUpdate);
    assert_eq!(store.stored_value(&property("A")), double(4.0));

    // Same value again: nothing happens
    assert!(push.push(double(4.0)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(drain(&mut rx).is_empty());
    assert_eq!(store.put_count(), 1);

    service.stop().await;
    assert!(!service.context().asset_connections().is_subscribed(&property("A")));
    assert!(!push.push(ElementValue::Property(Some(TypedValue::Double(5.0)))));
}
