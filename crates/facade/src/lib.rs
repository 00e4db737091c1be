//! # embranch-facade
//!
//! The tool surface: typed functions per tool, response envelopes, and the
//! out-of-sync warning wrapper. Consumers (the CLI and the stdio dispatcher)
//! call these and serialize the returned envelopes to JSON.

pub mod collections;
pub mod documents;
pub mod versioning;
pub mod wrap;

pub use collections::{create_collection, delete_collection, list_collections};
pub use documents::{
    add_documents, delete_documents, get_collection_count, get_documents, query_documents,
    update_documents,
};
pub use versioning::{
    checkout, clone_repository, history, pull, push, repository_status, set_remote, sync_status,
};
pub use wrap::{attach_warning, respond};

pub use embranch_api::v1 as api;
pub use embranch_infra::{ServerState, init_logging};
pub use embranch_shared::RequestContext;

/// Returns the facade crate version.
#[must_use]
pub const fn facade_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
