//! # embranch-config
//!
//! Environment-driven configuration for the embranch workspace: variable
//! names, strict parsing, the config schema, and project-root resolution.

pub mod env;
pub mod load;
pub mod schema;

pub use env::{
    ENV_AUTO_DETECT_PROJECT_ROOT, ENV_CHROMA_DATA_PATH, ENV_DATA_PATH, ENV_DOLT_COMMAND_TIMEOUT,
    ENV_DOLT_EXECUTABLE_PATH, ENV_DOLT_REMOTE_NAME, ENV_DOLT_REMOTE_URL,
    ENV_DOLT_REPOSITORY_PATH, ENV_ENABLE_LOGGING, ENV_INIT_MODE, ENV_LOG_FILE_NAME, ENV_LOG_LEVEL,
    ENV_PROJECT_ROOT, ENV_USE_MANIFEST, REMOVED_ENV_VARS,
};
pub use load::{LoadedConfig, load_from_env, resolve_project_root};
pub use schema::{
    DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_QUEUE_CAPACITY, DoltConfig, EmbranchConfig,
    LoggingConfig, ManifestConfig, STATE_DIR_NAME, StoreConfig,
};

/// Returns the config crate version.
#[must_use]
pub const fn config_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
