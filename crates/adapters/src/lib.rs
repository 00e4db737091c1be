//! # embranch-adapters
//!
//! Adapter implementations for the embranch ports: the Dolt CLI process
//! driver, the locked manifest store, the embedded vector store behind its
//! single worker, the default hash embedding, and the tracing logger.

pub mod dolt_cli;
pub mod embedding_hash;
pub mod logger;
pub mod manifest_store;
pub mod store;

pub use dolt_cli::{DoltCli, parse_log, parse_remotes, parse_status};
pub use embedding_hash::{DEFAULT_HASH_DIMENSION, HashEmbedding};
pub use logger::TracingLogger;
pub use manifest_store::ManifestStore;
pub use store::{
    COLLECTION_CONFIG_TYPE, LocalStore, StoreWorker, WorkerVectorStore,
    migrate_legacy_collections, spawn_store_worker,
};

/// Returns the adapters crate version.
#[must_use]
pub const fn adapters_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
