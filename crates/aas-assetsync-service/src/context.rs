//! Shared state of the request handlers and the synchronization helpers.

use crate::error::ServiceError;
use crate::locks::KeyedLocks;
use crate::messagebus::MessageBus;
use crate::operation::OperationRegistry;
use aas_assetsync_assetconnection::{AssetConnectionError, AssetConnectionManager, ServiceContext};
use aas_assetsync_core::{
    ElementContent, ElementValue, EventMessage, Referable, Reference, SubmodelElement, TypeInfo,
};
use aas_assetsync_persistence::{OutputModifier, Persistence};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// An element whose stored value was replaced by an asset value.
///
/// The reference stays locked until the update is dropped, so events about
/// it go out before any later write to the same reference.
#[derive(Debug)]
pub struct ValueUpdate {
    /// Stored value before the update
    pub old_value: ElementValue,
    /// Element as stored after the update
    pub element: SubmodelElement,
    _guard: OwnedMutexGuard<()>,
}

/// Everything a handler works with.
///
/// Cloning is cheap; all clones share the same store, bus, connections and locks.
#[derive(Clone)]
pub struct RequestContext {
    persistence: Arc<dyn Persistence>,
    bus: MessageBus,
    assets: Arc<AssetConnectionManager>,
    locks: Arc<KeyedLocks>,
    operations: OperationRegistry,
}

impl RequestContext {
    /// Assemble a context. The operation registry shares `persistence` and `bus`.
    #[must_use]
    pub fn new(
        persistence: Arc<dyn Persistence>,
        bus: MessageBus,
        assets: Arc<AssetConnectionManager>,
    ) -> Self {
        let operations = OperationRegistry::new(Arc::clone(&persistence), bus.clone());
        Self {
            persistence,
            bus,
            assets,
            locks: Arc::new(KeyedLocks::new()),
            operations,
        }
    }

    /// The model store.
    #[must_use]
    pub fn persistence(&self) -> &dyn Persistence {
        self.persistence.as_ref()
    }

    /// The message bus.
    #[must_use]
    pub fn message_bus(&self) -> &MessageBus {
        &self.bus
    }

    /// The asset connections.
    #[must_use]
    pub fn asset_connections(&self) -> &AssetConnectionManager {
        &self.assets
    }

    /// The per-reference locks.
    #[must_use]
    pub fn locks(&self) -> &KeyedLocks {
        &self.locks
    }

    /// The asynchronous operation registry.
    #[must_use]
    pub fn operations(&self) -> &OperationRegistry {
        &self.operations
    }

    /// Read the live value of `reference`, `None` without a value provider.
    ///
    /// # Errors
    ///
    /// Returns the provider's error. Callers must not fall back to the stored value.
    pub async fn read_value_from_asset(
        &self,
        reference: &Reference,
    ) -> Result<Option<ElementValue>, AssetConnectionError> {
        if !self.assets.has_value_provider(reference) {
            return Ok(None);
        }
        let provider = self.assets.get_value_provider(reference)?;
        provider.get_value().await.map(Some)
    }

    /// Write a data element value to the asset of `reference`, if it has a value provider.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    pub async fn write_value_to_asset(
        &self,
        reference: &Reference,
        value: &ElementValue,
    ) -> Result<(), AssetConnectionError> {
        if !value.is_data_element() || !self.assets.has_value_provider(reference) {
            return Ok(());
        }
        let provider = self.assets.get_value_provider(reference)?;
        tracing::debug!(reference = %reference, "Writing value to asset");
        provider.set_value(value.clone()).await
    }

    /// Store `value` for `reference` unless it equals the stored value.
    ///
    /// The compare and the write happen under the reference's lock, which the
    /// returned [`ValueUpdate`] keeps holding. Returns `None` when nothing
    /// changed, in which case nothing was written either.
    ///
    /// # Errors
    ///
    /// Returns error if the element does not exist, the value does not fit the
    /// element, or the store fails.
    pub async fn apply_asset_value(
        &self,
        reference: &Reference,
        value: ElementValue,
    ) -> Result<Option<ValueUpdate>, ServiceError> {
        let guard = self.locks.lock(reference).await;

        let stored = self
            .persistence
            .get(reference, &OutputModifier::DEFAULT)?
            .into_submodel_element()
            .ok_or_else(|| ServiceError::BadRequest(format!("{reference} is not a submodel element")))?;
        let old_value = stored.to_value()?;
        if old_value == value {
            return Ok(None);
        }

        let mut updated = stored;
        updated.set_value(value)?;
        let element = self
            .persistence
            .put(reference.parent().as_ref(), reference, updated.into())?
            .into_submodel_element()
            .ok_or_else(|| ServiceError::BadRequest(format!("{reference} is not a submodel element")))?;
        Ok(Some(ValueUpdate {
            old_value,
            element,
            _guard: guard,
        }))
    }

    /// Refresh `elements` (the children of `parent`) from their assets.
    ///
    /// Collections are descended into and every sibling is visited. Elements
    /// whose asset value differs from the stored one are written to the store,
    /// updated in `elements`, and announced with an `ElementUpdate`.
    ///
    /// # Errors
    ///
    /// Returns the first provider, mapping or store error.
    pub async fn sync_elements(
        &self,
        parent: &Reference,
        elements: &mut [SubmodelElement],
    ) -> Result<(), ServiceError> {
        let mut targets = Vec::new();
        let mut queue: VecDeque<(Reference, Vec<usize>)> = elements
            .iter()
            .enumerate()
            .map(|(i, e)| (parent.child(e.key_type(), e.id_short.clone()), vec![i]))
            .collect();

        while let Some((reference, path)) = queue.pop_front() {
            let Some(element) = element_at(elements, &path) else {
                continue;
            };
            if element.is_collection() {
                for (i, child) in element.children().unwrap_or_default().iter().enumerate() {
                    let mut child_path = path.clone();
                    child_path.push(i);
                    queue.push_back((reference.child(child.key_type(), child.id_short.clone()), child_path));
                }
            } else if self.assets.has_value_provider(&reference) {
                targets.push((reference, path));
            }
        }

        for (reference, path) in targets {
            let Some(value) = self.read_value_from_asset(&reference).await? else {
                continue;
            };
            if let Some(update) = self.apply_asset_value(&reference, value).await? {
                tracing::debug!(reference = %reference, "Synchronized value from asset");
                if let Some(element) = element_at_mut(elements, &path) {
                    element.clone_from(&update.element);
                }
                self.publish_element_update(&reference, update.element.into());
            }
        }
        Ok(())
    }

    /// Publish a message; failures are logged, never returned.
    pub fn publish(&self, message: EventMessage) {
        let kind = message.kind();
        let element = message.element().clone();
        if let Err(err) = self.bus.publish(message) {
            tracing::warn!(reference = %element, kind = ?kind, error = %err, "Failed to publish event");
        }
    }

    /// Publish `ElementCreate`.
    pub fn publish_element_create(&self, reference: &Reference, value: Referable) {
        self.publish(EventMessage::ElementCreate {
            element: reference.clone(),
            value,
        });
    }

    /// Publish `ElementRead`.
    pub fn publish_element_read(&self, reference: &Reference, value: Referable) {
        self.publish(EventMessage::ElementRead {
            element: reference.clone(),
            value,
        });
    }

    /// Publish `ElementUpdate`.
    pub fn publish_element_update(&self, reference: &Reference, value: Referable) {
        self.publish(EventMessage::ElementUpdate {
            element: reference.clone(),
            value,
        });
    }

    /// Publish `ElementDelete`.
    pub fn publish_element_delete(&self, reference: &Reference, value: Referable) {
        self.publish(EventMessage::ElementDelete {
            element: reference.clone(),
            value,
        });
    }

    /// Publish `ValueChange`.
    pub fn publish_value_change(
        &self,
        reference: &Reference,
        old_value: Option<ElementValue>,
        new_value: ElementValue,
    ) {
        self.publish(EventMessage::ValueChange {
            element: reference.clone(),
            old_value,
            new_value,
        });
    }

    /// Publish `OperationInvoke`.
    pub fn publish_operation_invoke(
        &self,
        reference: &Reference,
        input: Vec<SubmodelElement>,
        inoutput: Vec<SubmodelElement>,
    ) {
        self.publish(EventMessage::OperationInvoke {
            element: reference.clone(),
            input,
            inoutput,
        });
    }

    /// Publish `OperationFinish`.
    pub fn publish_operation_finish(
        &self,
        reference: &Reference,
        output: Vec<SubmodelElement>,
        inoutput: Vec<SubmodelElement>,
    ) {
        self.publish(EventMessage::OperationFinish {
            element: reference.clone(),
            output,
            inoutput,
        });
    }
}

fn element_at<'a>(elements: &'a [SubmodelElement], path: &[usize]) -> Option<&'a SubmodelElement> {
    let (first, rest) = path.split_first()?;
    let mut element = elements.get(*first)?;
    for i in rest {
        element = element.children()?.get(*i)?;
    }
    Some(element)
}

fn element_at_mut<'a>(
    elements: &'a mut [SubmodelElement],
    path: &[usize],
) -> Option<&'a mut SubmodelElement> {
    let (first, rest) = path.split_first()?;
    let mut element = elements.get_mut(*first)?;
    for i in rest {
        element = element.children_mut()?.get_mut(*i)?;
    }
    Some(element)
}

/// Model lookups for asset connections, answered from the store.
pub struct PersistenceServiceContext {
    persistence: Arc<dyn Persistence>,
}

impl PersistenceServiceContext {
    /// Answer lookups from `persistence`.
    #[must_use]
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self { persistence }
    }

    fn element(&self, reference: &Reference) -> Option<SubmodelElement> {
        self.persistence
            .get(reference, &OutputModifier::DEFAULT)
            .ok()?
            .into_submodel_element()
    }
}

impl ServiceContext for PersistenceServiceContext {
    fn type_info(&self, reference: &Reference) -> Option<TypeInfo> {
        self.element(reference)?.type_info().ok()
    }

    fn operation_output_variables(&self, reference: &Reference) -> Option<Vec<SubmodelElement>> {
        match self.element(reference)?.content {
            ElementContent::Operation {
                output_variables, ..
            } => Some(output_variables),
            _ => None,
        }
    }
}
