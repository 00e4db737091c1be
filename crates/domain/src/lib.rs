//! # embranch-domain
//!
//! Domain model for embranch: validated primitives, the document model,
//! the project manifest, sync-state classification, and the pure push
//! analyzer. This crate depends only on `shared` and holds no I/O.

pub mod document;
pub mod manifest;
pub mod primitives;
pub mod push;
pub mod sync;

pub use document::{
    Document, DocumentRef, canonicalize_json, escape_sql_json, escape_sql_string, metadata_equal,
};
pub use manifest::{DEFAULT_BRANCH, DoltState, InitMode, MANIFEST_VERSION, Manifest};
pub use primitives::{
    BranchName, CollectionName, CommitHash, DocumentId, PrimitiveError, RemoteName,
};
pub use push::{PushOutcome, PushReport, RejectionKind, analyze_push};
pub use sync::{LocalChanges, SyncStateCheck, SyncStateReason};

/// Returns the domain crate version.
#[must_use]
pub const fn domain_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
