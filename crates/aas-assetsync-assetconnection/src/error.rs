//! Asset connection errors.

use crate::manager::Capability;
use aas_assetsync_core::{Reference, ValueMappingError};

/// Errors raised by asset connections, providers and the manager.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AssetConnectionError {
    /// No provider of the capability is registered for the reference
    #[error("no {capability} provider configured for {reference}")]
    NotConfigured {
        /// Looked-up reference
        reference: Reference,
        /// Looked-up capability
        capability: Capability,
    },
    /// Provider-level I/O failure
    #[error("asset I/O error for {reference}: {detail}")]
    Io {
        /// Reference the provider serves
        reference: Reference,
        /// Protocol detail
        detail: String,
    },
    /// Asset payload does not fit the element type
    #[error("cannot map asset value for {reference}: {source}")]
    Mapping {
        /// Reference the provider serves
        reference: Reference,
        /// Mapping failure
        source: ValueMappingError,
    },
    /// Connection-level failure (connect, disconnect)
    #[error("connection {connection} failed: {detail}")]
    Connection {
        /// Connection name
        connection: String,
        /// Protocol detail
        detail: String,
    },
    /// Invalid or ambiguous configuration
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A subscription is already active for the reference
    #[error("already subscribed: {0}")]
    AlreadySubscribed(Reference),
    /// The provider does not support the requested call
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// Several failures collected by a continue-on-error pass
    #[error("{} asset connection errors: {}", .0.len(), join(.0))]
    Aggregate(Vec<AssetConnectionError>),
}

impl AssetConnectionError {
    /// Collapse collected errors: none is `Ok`, one is itself, more are aggregated.
    ///
    /// # Errors
    ///
    /// Returns the collected error(s) if `errors` is not empty.
    pub fn collect(mut errors: Vec<AssetConnectionError>) -> Result<(), AssetConnectionError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(AssetConnectionError::Aggregate(errors)),
        }
    }
}

fn join(errors: &[AssetConnectionError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
