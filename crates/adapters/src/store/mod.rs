//! Embedded vector store: runtime, legacy migration, and worker gateway.

pub mod local;
pub mod migrate;
pub mod worker;

pub use local::{COLLECTION_CONFIG_TYPE, COLLECTIONS_DIR, CollectionConfig, LocalStore};
pub use migrate::migrate_legacy_collections;
pub use worker::{StoreWorker, WorkerVectorStore, spawn_store_worker};
