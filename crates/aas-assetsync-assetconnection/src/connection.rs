//! The asset connection contract.

use crate::error::AssetConnectionError;
use crate::provider::{AssetOperationProvider, AssetSubscriptionProvider, AssetValueProvider};
use aas_assetsync_core::Reference;
use async_trait::async_trait;
use std::sync::Arc;

/// Providers of one capability, keyed by the reference they serve.
pub type Providers<P> = Vec<(Reference, Arc<P>)>;

/// One configured link to an asset, bundling its providers.
///
/// A connection advertises only the capabilities it supports; the provider
/// lists default to empty.
#[async_trait]
pub trait AssetConnection: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Establish the link.
    ///
    /// # Errors
    ///
    /// Returns [`AssetConnectionError::Connection`] if the asset is unreachable.
    async fn connect(&self) -> Result<(), AssetConnectionError>;

    /// Release the link.
    ///
    /// # Errors
    ///
    /// Returns error if the link cannot be closed cleanly.
    async fn disconnect(&self) -> Result<(), AssetConnectionError>;

    /// Whether the link is currently up.
    fn is_connected(&self) -> bool;

    /// Value providers of this connection.
    fn value_providers(&self) -> Providers<dyn AssetValueProvider> {
        Vec::new()
    }

    /// Subscription providers of this connection.
    fn subscription_providers(&self) -> Providers<dyn AssetSubscriptionProvider> {
        Vec::new()
    }

    /// Operation providers of this connection.
    fn operation_providers(&self) -> Providers<dyn AssetOperationProvider> {
        Vec::new()
    }
}
