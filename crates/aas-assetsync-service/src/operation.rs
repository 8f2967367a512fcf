//! Asynchronous operation registry.
//!
//! An invocation is persisted as `Running` before the provider is started.
//! Providers report through an [`OperationCompletion`] that feeds a channel;
//! the registry task drains it, moves each result to its terminal state,
//! persists it and publishes `OperationFinish`.

use crate::error::ServiceError;
use crate::messagebus::MessageBus;
use aas_assetsync_assetconnection::{
    AssetConnectionError, AssetOperationProvider, CompletionEvent, OperationCompletion,
    OperationOutput,
};
use aas_assetsync_core::{EventMessage, OperationHandle, OperationResult, Reference, SubmodelElement};
use aas_assetsync_persistence::Persistence;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Tracks in-flight asynchronous invocations.
#[derive(Clone)]
pub struct OperationRegistry {
    persistence: Arc<dyn Persistence>,
    bus: MessageBus,
    tx: mpsc::UnboundedSender<CompletionEvent>,
    rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<CompletionEvent>>>>,
}

impl OperationRegistry {
    /// Create a registry. Completions queue up until [`start`](Self::start).
    #[must_use]
    pub fn new(persistence: Arc<dyn Persistence>, bus: MessageBus) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            persistence,
            bus,
            tx,
            rx: Arc::new(Mutex::new(Some(rx))),
        }
    }

    /// Spawn the completion task. Returns `None` if it was already started.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        let mut rx = self.rx.lock().take()?;
        let registry = self.clone();
        Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let handle_id = event.handle_id.clone();
                if let Err(err) = registry.finish(&event.handle_id, &event.reference, event.result) {
                    tracing::warn!(handle_id = %handle_id, error = %err, "Dropping operation completion");
                }
            }
            tracing::debug!("Operation registry stopped");
        }))
    }

    /// Start `provider` asynchronously and return the handle to poll.
    ///
    /// The handle is issued before the provider starts. If starting fails, the
    /// result is recorded as `Failed` and the handle is still returned.
    ///
    /// # Errors
    ///
    /// Returns error if the initial result cannot be stored.
    pub fn invoke(
        &self,
        reference: &Reference,
        provider: Arc<dyn AssetOperationProvider>,
        request_id: &str,
        input: Vec<SubmodelElement>,
        inoutput: Vec<SubmodelElement>,
    ) -> Result<OperationHandle, ServiceError> {
        let handle = self.persistence.put_operation_context(
            None,
            request_id,
            OperationResult::running(request_id, inoutput.clone()),
        )?;
        tracing::debug!(reference = %reference, handle_id = %handle.handle_id, "Operation started");

        self.publish(EventMessage::OperationInvoke {
            element: reference.clone(),
            input: input.clone(),
            inoutput: inoutput.clone(),
        });

        let completion = OperationCompletion::new(handle.handle_id.clone(), reference.clone(), self.tx.clone());
        if let Err(err) = provider.invoke_async(input, inoutput, completion) {
            tracing::warn!(reference = %reference, handle_id = %handle.handle_id, error = %err, "Operation could not be started");
            self.finish(&handle.handle_id, reference, Err(err))?;
        }
        Ok(handle)
    }

    /// Current result of an invocation.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ResourceNotFound`] for unknown handles.
    pub fn result(&self, handle_id: &str) -> Result<OperationResult, ServiceError> {
        Ok(self.persistence.get_operation_result(handle_id)?)
    }

    fn finish(
        &self,
        handle_id: &str,
        reference: &Reference,
        outcome: Result<OperationOutput, AssetConnectionError>,
    ) -> Result<(), ServiceError> {
        let mut result = self.persistence.get_operation_result(handle_id)?;
        match outcome {
            Ok(output) => result.complete(output.output, output.inoutput)?,
            Err(err) => result.fail(err.to_string())?,
        }
        let state = result.execution_state;
        let output = result.output_arguments.clone();
        let inoutput = result.inoutput_arguments.clone();
        let request_id = result.request_id.clone();
        self.persistence
            .put_operation_context(Some(handle_id), &request_id, result)?;
        tracing::debug!(reference = %reference, handle_id, state = ?state, "Operation finished");

        self.publish(EventMessage::OperationFinish {
            element: reference.clone(),
            output,
            inoutput,
        });
        Ok(())
    }

    fn publish(&self, message: EventMessage) {
        if let Err(err) = self.bus.publish(message) {
            tracing::warn!(error = %err, "Failed to publish operation event");
        }
    }
}
