//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use aas_assetsync_assetconnection::connection::Providers;
use aas_assetsync_assetconnection::{
    AssetConnection, AssetConnectionError, AssetOperationProvider, AssetSubscriptionProvider,
    AssetValueProvider, NewDataListener, OperationOutput,
};
use aas_assetsync_core::{
    AssetAdministrationShell, DataType, ElementContent, ElementValue, Environment, EventMessage,
    KeyType, OperationHandle, OperationResult, Referable, Reference, Submodel, SubmodelElement,
    TypedValue,
};
use aas_assetsync_persistence::{MemoryPersistence, OutputModifier, Persistence, PersistenceError};
use aas_assetsync_service::{CoreConfig, Response, ResponsePayload, Service};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const SUBMODEL_ID: &str = "urn:example:sm:machine";
pub const SHELL_ID: &str = "urn:example:aas:machine";

pub fn submodel() -> Reference {
    Reference::submodel(SUBMODEL_ID)
}

pub fn property(id_short: &str) -> Reference {
    submodel().child(KeyType::Property, id_short)
}

pub fn nested(id_short: &str) -> Reference {
    submodel()
        .child(KeyType::SubmodelElementCollection, "Motor")
        .child(KeyType::Property, id_short)
}

pub fn operation(id_short: &str) -> Reference {
    submodel().child(KeyType::Operation, id_short)
}

pub fn double(value: f64) -> ElementValue {
    ElementValue::Property(Some(TypedValue::Double(value)))
}

fn double_variable(id_short: &str) -> SubmodelElement {
    SubmodelElement::new(
        id_short,
        ElementContent::Property {
            value_type: DataType::Double,
            value: None,
        },
    )
}

pub fn argument(id_short: &str, value: f64) -> SubmodelElement {
    SubmodelElement::property(id_short, TypedValue::Double(value))
}

fn operation_element(id_short: &str) -> SubmodelElement {
    SubmodelElement::new(
        id_short,
        ElementContent::Operation {
            input_variables: vec![double_variable("x")],
            output_variables: vec![double_variable("x_sqrt")],
            inoutput_variables: Vec::new(),
        },
    )
}

/// Shell plus one submodel:
/// `A = 1.0`, `B = 2.0`, `Motor { Speed = 10.0 }`, `C = 3.0`, operations `Sqrt`, `Broken` and `Unbound`.
pub fn environment() -> Environment {
    let mut machine = Submodel::new(SUBMODEL_ID);
    machine.id_short = Some("Machine".to_string());
    machine.semantic_id = Some(Reference::submodel("urn:example:semantic:machine"));
    machine.submodel_elements = vec![
        SubmodelElement::property("A", TypedValue::Double(1.0)),
        SubmodelElement::property("B", TypedValue::Double(2.0)),
        SubmodelElement::collection(
            "Motor",
            vec![SubmodelElement::property("Speed", TypedValue::Double(10.0))],
        ),
        SubmodelElement::property("C", TypedValue::Double(3.0)),
        operation_element("Sqrt"),
        operation_element("Broken"),
        operation_element("Unbound"),
    ];

    Environment {
        shells: vec![AssetAdministrationShell {
            id: SHELL_ID.to_string(),
            id_short: Some("Machine".to_string()),
            global_asset_id: Some("urn:example:asset:machine".to_string()),
            submodels: vec![submodel()],
        }],
        submodels: vec![machine],
    }
}

/// Value provider backed by a cell, counting reads and writes.
pub struct MockValueProvider {
    value: Mutex<ElementValue>,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
}

impl MockValueProvider {
    pub fn new(value: ElementValue) -> Arc<Self> {
        Arc::new(Self {
            value: Mutex::new(value),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        })
    }

    pub fn current(&self) -> ElementValue {
        self.value.lock().clone()
    }

    pub fn replace(&self, value: ElementValue) {
        *self.value.lock() = value;
    }
}

#[async_trait]
impl AssetValueProvider for MockValueProvider {
    async fn get_value(&self) -> Result<ElementValue, AssetConnectionError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.value.lock().clone())
    }

    async fn set_value(&self, value: ElementValue) -> Result<(), AssetConnectionError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        *self.value.lock() = value;
        Ok(())
    }
}

/// Value provider that takes `delay` to write `slow`, and no time for anything else.
pub struct SlowValueProvider {
    value: Mutex<ElementValue>,
    slow: ElementValue,
    delay: Duration,
}

impl SlowValueProvider {
    pub fn new(value: ElementValue, slow: ElementValue, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            value: Mutex::new(value),
            slow,
            delay,
        })
    }

    pub fn current(&self) -> ElementValue {
        self.value.lock().clone()
    }
}

#[async_trait]
impl AssetValueProvider for SlowValueProvider {
    async fn get_value(&self) -> Result<ElementValue, AssetConnectionError> {
        Ok(self.value.lock().clone())
    }

    async fn set_value(&self, value: ElementValue) -> Result<(), AssetConnectionError> {
        if value == self.slow {
            tokio::time::sleep(self.delay).await;
        }
        *self.value.lock() = value;
        Ok(())
    }
}

/// Value provider whose asset is unreachable.
pub struct UnreachableValueProvider {
    pub reference: Reference,
}

#[async_trait]
impl AssetValueProvider for UnreachableValueProvider {
    async fn get_value(&self) -> Result<ElementValue, AssetConnectionError> {
        Err(AssetConnectionError::Io {
            reference: self.reference.clone(),
            detail: "connection refused".to_string(),
        })
    }

    async fn set_value(&self, _value: ElementValue) -> Result<(), AssetConnectionError> {
        Err(AssetConnectionError::Io {
            reference: self.reference.clone(),
            detail: "connection refused".to_string(),
        })
    }
}

/// Subscription provider the test pushes values through.
#[derive(Default)]
pub struct PushSubscriptionProvider {
    listener: Mutex<Option<NewDataListener>>,
}

impl PushSubscriptionProvider {
    pub fn push(&self, value: ElementValue) -> bool {
        match self.listener.lock().as_ref() {
            Some(listener) => listener.notify(value),
            None => false,
        }
    }
}

#[async_trait]
impl AssetSubscriptionProvider for PushSubscriptionProvider {
    async fn subscribe(&self, listener: NewDataListener) -> Result<(), AssetConnectionError> {
        let mut slot = self.listener.lock();
        if slot.is_some() {
            return Err(AssetConnectionError::AlreadySubscribed(listener.reference().clone()));
        }
        *slot = Some(listener);
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<(), AssetConnectionError> {
        self.listener.lock().take();
        Ok(())
    }

    fn is_subscribed(&self) -> bool {
        self.listener.lock().is_some()
    }
}

/// Computes `x_sqrt` from `x`; the in-out arguments are echoed.
pub struct SqrtOperationProvider;

#[async_trait]
impl AssetOperationProvider for SqrtOperationProvider {
    async fn invoke(
        &self,
        input: &[SubmodelElement],
        inoutput: &[SubmodelElement],
    ) -> Result<OperationOutput, AssetConnectionError> {
        let x = input
            .iter()
            .find(|arg| arg.id_short == "x")
            .and_then(|arg| arg.to_value().ok());
        let Some(ElementValue::Property(Some(TypedValue::Double(x)))) = x else {
            return Err(AssetConnectionError::Unsupported("x must be a double".to_string()));
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        Ok(OperationOutput {
            output: vec![argument("x_sqrt", x.sqrt())],
            inoutput: inoutput.to_vec(),
        })
    }
}

/// Operation provider whose asset always fails.
pub struct FailingOperationProvider {
    pub reference: Reference,
}

#[async_trait]
impl AssetOperationProvider for FailingOperationProvider {
    async fn invoke(
        &self,
        _input: &[SubmodelElement],
        _inoutput: &[SubmodelElement],
    ) -> Result<OperationOutput, AssetConnectionError> {
        Err(AssetConnectionError::Io {
            reference: self.reference.clone(),
            detail: "device busy".to_string(),
        })
    }
}

/// An in-process connection serving whatever providers it was given.
pub struct TestConnection {
    name: String,
    connected: AtomicBool,
    pub values: Providers<dyn AssetValueProvider>,
    pub subscriptions: Providers<dyn AssetSubscriptionProvider>,
    pub operations: Providers<dyn AssetOperationProvider>,
}

impl TestConnection {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            connected: AtomicBool::new(false),
            values: Vec::new(),
            subscriptions: Vec::new(),
            operations: Vec::new(),
        }
    }

    pub fn with_value(mut self, reference: Reference, provider: Arc<dyn AssetValueProvider>) -> Self {
        self.values.push((reference, provider));
        self
    }

    pub fn with_subscription(
        mut self,
        reference: Reference,
        provider: Arc<dyn AssetSubscriptionProvider>,
    ) -> Self {
        self.subscriptions.push((reference, provider));
        self
    }

    pub fn with_operation(
        mut self,
        reference: Reference,
        provider: Arc<dyn AssetOperationProvider>,
    ) -> Self {
        self.operations.push((reference, provider));
        self
    }
}

#[async_trait]
impl AssetConnection for TestConnection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<(), AssetConnectionError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AssetConnectionError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn value_providers(&self) -> Providers<dyn AssetValueProvider> {
        self.values.clone()
    }

    fn subscription_providers(&self) -> Providers<dyn AssetSubscriptionProvider> {
        self.subscriptions.clone()
    }

    fn operation_providers(&self) -> Providers<dyn AssetOperationProvider> {
        self.operations.clone()
    }
}

/// Memory store counting element writes.
pub struct CountingPersistence {
    inner: MemoryPersistence,
    pub puts: AtomicUsize,
}

impl CountingPersistence {
    pub fn new(environment: Environment) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryPersistence::with_environment(environment),
            puts: AtomicUsize::new(0),
        })
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn stored_value(&self, reference: &Reference) -> ElementValue {
        self.inner
            .get(reference, &OutputModifier::DEFAULT)
            .ok()
            .and_then(Referable::into_submodel_element)
            .and_then(|e| e.to_value().ok())
            .unwrap_or(ElementValue::Property(None))
    }
}

impl Persistence for CountingPersistence {
    fn get(&self, reference: &Reference, modifier: &OutputModifier) -> Result<Referable, PersistenceError> {
        self.inner.get(reference, modifier)
    }

    fn get_all_submodels(&self, modifier: &OutputModifier) -> Result<Vec<Submodel>, PersistenceError> {
        self.inner.get_all_submodels(modifier)
    }

    fn get_submodel_elements(
        &self,
        parent: &Reference,
        modifier: &OutputModifier,
    ) -> Result<Vec<SubmodelElement>, PersistenceError> {
        self.inner.get_submodel_elements(parent, modifier)
    }

    fn put(
        &self,
        parent: Option<&Reference>,
        reference: &Reference,
        element: Referable,
    ) -> Result<Referable, PersistenceError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(parent, reference, element)
    }

    fn remove(&self, reference: &Reference) -> Result<Referable, PersistenceError> {
        self.inner.remove(reference)
    }

    fn get_operation_result(&self, handle_id: &str) -> Result<OperationResult, PersistenceError> {
        self.inner.get_operation_result(handle_id)
    }

    fn put_operation_context(
        &self,
        handle_id: Option<&str>,
        request_id: &str,
        result: OperationResult,
    ) -> Result<OperationHandle, PersistenceError> {
        self.inner.put_operation_context(handle_id, request_id, result)
    }
}

pub fn payload(response: Response<ResponsePayload>) -> ResponsePayload {
    assert!(
        response.status_code.is_success(),
        "unexpected failure: {:?}",
        response.message
    );
    response.payload.expect("payload")
}

pub fn element_payload(response: Response<ResponsePayload>) -> SubmodelElement {
    match payload(response) {
        ResponsePayload::SubmodelElement(element) => element,
        other => panic!("expected a submodel element, got {other:?}"),
    }
}

/// A started service over `store` and `connection`.
pub async fn start(store: Arc<CountingPersistence>, connection: TestConnection) -> Service {
    let connections: Vec<Arc<dyn AssetConnection>> = vec![Arc::new(connection)];
    let service =
        Service::new(CoreConfig::default(), store, connections).expect("valid configuration");
    service.start().await;
    service
}

/// Everything currently queued on `rx`.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<EventMessage>) -> Vec<EventMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}
