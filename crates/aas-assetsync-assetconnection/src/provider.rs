//! Provider capability contracts.

use crate::error::AssetConnectionError;
use aas_assetsync_core::{ElementValue, Reference, SubmodelElement};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Reads and writes the value of one element on the asset.
#[async_trait]
pub trait AssetValueProvider: Send + Sync {
    /// Read the current asset value.
    ///
    /// # Errors
    ///
    /// Returns [`AssetConnectionError::Io`] on protocol failures.
    async fn get_value(&self) -> Result<ElementValue, AssetConnectionError>;

    /// Write a value to the asset.
    ///
    /// # Errors
    ///
    /// Returns [`AssetConnectionError::Io`] on protocol failures.
    async fn set_value(&self, value: ElementValue) -> Result<(), AssetConnectionError>;
}

/// A value pushed by an asset.
#[derive(Debug, Clone, PartialEq)]
pub struct NewData {
    /// Element the value belongs to
    pub reference: Reference,
    /// The pushed value
    pub value: ElementValue,
}

/// Sink handed to a subscription provider.
///
/// [`notify`](Self::notify) never blocks the provider's I/O task: when the
/// queue is full the value is dropped.
#[derive(Debug, Clone)]
pub struct NewDataListener {
    reference: Reference,
    tx: mpsc::Sender<NewData>,
}

impl NewDataListener {
    /// Create a listener for `reference` feeding `tx`.
    #[must_use]
    pub fn new(reference: Reference, tx: mpsc::Sender<NewData>) -> Self {
        Self { reference, tx }
    }

    /// Reference this listener receives values for.
    #[must_use]
    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    /// Deliver a new value. Returns `false` if it was dropped.
    pub fn notify(&self, value: ElementValue) -> bool {
        let data = NewData {
            reference: self.reference.clone(),
            value,
        };
        match self.tx.try_send(data) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(reference = %self.reference, "Subscription queue full, dropping value");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(reference = %self.reference, "Subscription receiver dropped");
                false
            }
        }
    }
}

/// Pushes new values of one element from the asset.
#[async_trait]
pub trait AssetSubscriptionProvider: Send + Sync {
    /// Start delivering values to `listener`.
    ///
    /// # Errors
    ///
    /// Returns [`AssetConnectionError::AlreadySubscribed`] if a subscription is
    /// active, or [`AssetConnectionError::Io`] on protocol failures.
    async fn subscribe(&self, listener: NewDataListener) -> Result<(), AssetConnectionError>;

    /// Stop delivering values. Calling it without an active subscription is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`AssetConnectionError::Io`] on protocol failures.
    async fn unsubscribe(&self) -> Result<(), AssetConnectionError>;

    /// Whether a subscription is active.
    fn is_subscribed(&self) -> bool;
}

/// Output of an operation invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationOutput {
    /// Output arguments
    pub output: Vec<SubmodelElement>,
    /// In-out arguments after the call
    pub inoutput: Vec<SubmodelElement>,
}

/// Completion of an asynchronous invocation, as seen by the registry.
#[derive(Debug)]
pub struct CompletionEvent {
    /// Handle the completion belongs to
    pub handle_id: String,
    /// Invoked operation
    pub reference: Reference,
    /// Provider outcome
    pub result: Result<OperationOutput, AssetConnectionError>,
}

/// One-shot completion callback for an asynchronous invocation.
///
/// [`complete`](Self::complete) consumes the callback, so it fires at most once.
#[derive(Debug)]
pub struct OperationCompletion {
    handle_id: String,
    reference: Reference,
    tx: mpsc::UnboundedSender<CompletionEvent>,
}

impl OperationCompletion {
    /// Create a completion for `handle_id` feeding `tx`.
    #[must_use]
    pub fn new(
        handle_id: impl Into<String>,
        reference: Reference,
        tx: mpsc::UnboundedSender<CompletionEvent>,
    ) -> Self {
        Self {
            handle_id: handle_id.into(),
            reference,
            tx,
        }
    }

    /// Handle this completion belongs to.
    #[must_use]
    pub fn handle_id(&self) -> &str {
        &self.handle_id
    }

    /// Report the outcome.
    pub fn complete(self, result: Result<OperationOutput, AssetConnectionError>) {
        let event = CompletionEvent {
            handle_id: self.handle_id,
            reference: self.reference,
            result,
        };
        if let Err(err) = self.tx.send(event) {
            tracing::debug!(
                handle_id = %err.0.handle_id,
                "Operation registry stopped, dropping completion"
            );
        }
    }
}

/// Invokes a remote procedure on the asset.
#[async_trait]
pub trait AssetOperationProvider: Send + Sync + 'static {
    /// Invoke and wait for the result.
    ///
    /// # Errors
    ///
    /// Returns [`AssetConnectionError::Io`] on protocol failures.
    async fn invoke(
        &self,
        input: &[SubmodelElement],
        inoutput: &[SubmodelElement],
    ) -> Result<OperationOutput, AssetConnectionError>;

    /// Start an invocation and return immediately.
    ///
    /// The default runs [`invoke`](Self::invoke) on a spawned task and reports
    /// through `completion`. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the invocation cannot be started; `completion` is not
    /// called then.
    fn invoke_async(
        self: Arc<Self>,
        input: Vec<SubmodelElement>,
        inoutput: Vec<SubmodelElement>,
        completion: OperationCompletion,
    ) -> Result<(), AssetConnectionError> {
        tokio::spawn(async move {
            let result = self.invoke(&input, &inoutput).await;
            completion.complete(result);
        });
        Ok(())
    }
}
