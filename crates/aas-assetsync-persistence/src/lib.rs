//! # AAS-AssetSync Persistence
//!
//! The model store consumed by the request handlers.
//!
//! This crate provides:
//! - The [`Persistence`] contract with a distinguishable not-found error
//! - [`OutputModifier`] views (deep/core, with/without blob content)
//! - [`MemoryPersistence`], an environment behind a lock
//! - [`SqlitePersistence`], CBOR-encoded identifiables in `SQLite`

#![warn(missing_docs)]
#![warn(clippy::all)]

mod memory;
mod modifier;
mod persistence;
mod sqlite;
mod tree;

pub use memory::MemoryPersistence;
pub use modifier::{Extent, Level, OutputModifier};
pub use persistence::{Persistence, PersistenceError};
pub use sqlite::SqlitePersistence;
