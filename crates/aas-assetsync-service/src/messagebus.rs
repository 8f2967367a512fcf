//! In-process publish/subscribe of [`EventMessage`]s.
//!
//! Every subscriber owns an unbounded queue, so [`MessageBus::publish`] never
//! blocks and each subscriber sees messages in publication order. Subscribers
//! whose receiving side is gone are pruned on the next publish.

use aas_assetsync_core::{EventKind, EventMessage, Reference};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Token returned by subscribe calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Which messages a subscriber receives.
///
/// An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionInfo {
    kinds: Option<HashSet<EventKind>>,
    prefix: Option<Reference>,
}

impl SubscriptionInfo {
    /// Match every message.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Match only messages of `kinds`.
    #[must_use]
    pub fn kinds(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            kinds: Some(kinds.into_iter().collect()),
            prefix: None,
        }
    }

    /// Additionally require the message's element to lie at or below `prefix`.
    #[must_use]
    pub fn below(mut self, prefix: Reference) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Whether `message` passes this filter.
    #[must_use]
    pub fn matches(&self, message: &EventMessage) -> bool {
        self.kinds
            .as_ref()
            .map_or(true, |kinds| kinds.contains(&message.kind()))
            && self
                .prefix
                .as_ref()
                .map_or(true, |prefix| message.element().starts_with(prefix))
    }
}

struct Subscriber {
    info: SubscriptionInfo,
    tx: mpsc::UnboundedSender<EventMessage>,
}

#[derive(Default)]
struct Inner {
    subscribers: RwLock<HashMap<SubscriptionId, Subscriber>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

/// Cloneable handle to the message bus.
#[derive(Clone, Default)]
pub struct MessageBus {
    inner: Arc<Inner>,
}

impl MessageBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `message` to every matching subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`MessageBusError::Closed`] after [`close`](Self::close).
    pub fn publish(&self, message: EventMessage) -> Result<(), MessageBusError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(MessageBusError::Closed);
        }

        let mut dead = Vec::new();
        {
            let subscribers = self.inner.subscribers.read();
            for (id, subscriber) in subscribers.iter() {
                if subscriber.info.matches(&message) && subscriber.tx.send(message.clone()).is_err() {
                    dead.push(*id);
                }
            }
        }

        if !dead.is_empty() {
            let mut subscribers = self.inner.subscribers.write();
            for id in dead {
                subscribers.remove(&id);
                tracing::debug!(subscription = %id, "Pruned closed bus subscriber");
            }
        }
        Ok(())
    }

    /// Subscribe and receive matching messages on a channel.
    ///
    /// # Errors
    ///
    /// Returns [`MessageBusError::Closed`] after [`close`](Self::close).
    pub fn subscribe_channel(
        &self,
        info: SubscriptionInfo,
    ) -> Result<(SubscriptionId, mpsc::UnboundedReceiver<EventMessage>), MessageBusError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(MessageBusError::Closed);
        }
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .subscribers
            .write()
            .insert(id, Subscriber { info, tx });
        Ok((id, rx))
    }

    /// Subscribe a handler running on its own task.
    ///
    /// A panicking handler is logged and keeps receiving later messages.
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MessageBusError::Closed`] after [`close`](Self::close).
    pub fn subscribe<F>(&self, info: SubscriptionInfo, handler: F) -> Result<SubscriptionId, MessageBusError>
    where
        F: Fn(EventMessage) + Send + 'static,
    {
        let (id, mut rx) = self.subscribe_channel(info)?;
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let kind = message.kind();
                if catch_unwind(AssertUnwindSafe(|| handler(message))).is_err() {
                    tracing::warn!(subscription = %id, kind = ?kind, "Bus subscriber panicked");
                }
            }
        });
        Ok(id)
    }

    /// Remove a subscription. Returns `false` if it was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.write().remove(&id).is_some()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Refuse further publishes and drop all subscriptions.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.subscribers.write().clear();
    }
}

/// Errors that can occur on the message bus.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageBusError {
    /// The bus was closed
    #[error("message bus closed")]
    Closed,
}
