//! # embranch-ports
//!
//! Port traits for the embranch hexagonal architecture.
//!
//! This crate defines the interfaces between the domain and infrastructure
//! layers. It depends only on `domain` and `shared`.

use std::future::Future;
use std::pin::Pin;

/// Boxed future used by port traits.
///
/// We deliberately use boxed futures for boundary traits (I/O-bound work);
/// the allocation is noise next to process spawns and disk access.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Returns the ports crate version.
#[must_use]
pub const fn ports_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub mod dolt;
pub mod embedding;
pub mod logger;
pub mod manifest;
pub mod vectordb;

pub use dolt::*;
pub use embedding::*;
pub use logger::*;
pub use manifest::*;
pub use vectordb::*;

// Re-export selected domain types used in port signatures, so adapter crates
// can implement ports without directly depending on `embranch-domain`.
pub use embranch_domain::{CollectionName, Document, DocumentId};
