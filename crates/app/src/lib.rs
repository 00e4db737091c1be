//! # embranch-app
//!
//! Application use-cases for embranch: the sync-state checker, the change
//! detector, the sync engine flows (push, pull, checkout), and the startup
//! initializer. This crate depends on `ports`, `domain`, and `shared`.

pub mod change_detection;
pub mod documents_table;
pub mod initialize;
pub mod process_checkout;
pub mod process_pull;
pub mod process_push;
pub mod sync_state;

pub use change_detection::{ChangeDetection, ChangeDetectorDeps, detect_changes};
pub use documents_table::{
    DOCUMENTS_TABLE, SCHEMA_TABLES, SYNC_LOG_TABLE, ensure_schema, schema_exists,
};
pub use initialize::{
    InitStatus, InitializeDeps, InitializeInput, InitializeOutput, ProcessCloneInput, initialize,
    is_repository_empty, process_clone,
};
pub use process_checkout::{
    ProcessCheckoutDeps, ProcessCheckoutInput, ProcessCheckoutOutput, process_checkout,
};
pub use process_pull::{
    ProcessPullDeps, ProcessPullInput, ProcessPullOutput, ReplayCounts, process_pull,
};
pub use process_push::{ProcessPushDeps, ProcessPushInput, ProcessPushOutput, process_push};
pub use sync_state::SyncStateChecker;

/// Returns the app crate version.
#[must_use]
pub const fn app_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
