//! # AAS-AssetSync Asset Connections
//!
//! Capability contracts between the engine and live assets.
//!
//! An [`AssetConnection`] represents one physical link (one MQTT client, one
//! HTTP endpoint) and advertises providers per [`Reference`](aas_assetsync_core::Reference):
//!
//! - [`AssetValueProvider`]: synchronous get/set
//! - [`AssetSubscriptionProvider`]: pushed values via a [`NewDataListener`]
//! - [`AssetOperationProvider`]: remote procedures, sync or async via [`OperationCompletion`]
//!
//! The [`AssetConnectionManager`] aggregates all connections, answers provider
//! lookups, and owns the connection lifecycle.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod content;
pub mod context;
pub mod error;
pub mod manager;
pub mod provider;

pub use connection::AssetConnection;
pub use context::ServiceContext;
pub use error::AssetConnectionError;
pub use manager::{AssetConnectionManager, Capability};
pub use provider::{
    AssetOperationProvider, AssetSubscriptionProvider, AssetValueProvider, CompletionEvent,
    NewData, NewDataListener, OperationCompletion, OperationOutput,
};
