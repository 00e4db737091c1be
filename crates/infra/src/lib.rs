//! # embranch-infra
//!
//! Infrastructure wiring for embranch: building configured adapters, the
//! shared server state with its write-path mutex, and logging bootstrap.

pub mod logging;
pub mod server;

pub use logging::init_logging;
pub use server::ServerState;

/// Returns the infra crate version.
#[must_use]
pub const fn infra_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
