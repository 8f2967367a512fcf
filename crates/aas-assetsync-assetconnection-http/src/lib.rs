//! # AAS-AssetSync HTTP Asset Connection
//!
//! Connects model elements to resources of an HTTP endpoint.
//!
//! - Value providers read with `GET` and write with `PUT`, `POST` or `PATCH`
//! - Subscription providers poll a resource and report changed values
//! - Operation providers send arguments as a JSON object and map the response
//!   onto the operation's output variables
//!
//! Payloads use the value-only JSON form, see
//! [`content`](aas_assetsync_assetconnection::content).

#![warn(missing_docs)]
#![warn(clippy::all)]

mod client;
mod config;
mod connection;
mod provider;

pub use client::{HttpClient, HttpError};
pub use config::{
    HttpAssetConnectionConfig, HttpOperationProviderConfig, HttpSubscriptionProviderConfig,
    HttpValueProviderConfig, RequestMethod,
};
pub use connection::HttpAssetConnection;
pub use provider::{HttpOperationProvider, HttpSubscriptionProvider, HttpValueProvider};
