//! Environment variable names and strict value parsing.
//!
//! Parsing rules:
//! - strict (invalid values fail fast with the variable name in metadata)
//! - booleans accept `true/false`, `1/0`, `yes/no`, `on/off` (case-insensitive)

use embranch_shared::{ErrorCode, ErrorEnvelope, Result};

/// Env var: path to the local Dolt repository.
pub const ENV_DOLT_REPOSITORY_PATH: &str = "DOLT_REPOSITORY_PATH";
/// Env var: seed remote URL, consulted for the initial manifest only.
pub const ENV_DOLT_REMOTE_URL: &str = "DOLT_REMOTE_URL";
/// Env var: path to the Dolt CLI executable (default: resolved via PATH).
pub const ENV_DOLT_EXECUTABLE_PATH: &str = "DOLT_EXECUTABLE_PATH";
/// Env var: remote name (default `origin`).
pub const ENV_DOLT_REMOTE_NAME: &str = "DOLT_REMOTE_NAME";
/// Env var: external command timeout in seconds (default 60).
pub const ENV_DOLT_COMMAND_TIMEOUT: &str = "DOLT_COMMAND_TIMEOUT";

/// Env var: embranch data root.
pub const ENV_DATA_PATH: &str = "DMMS_DATA_PATH";
/// Env var: vector store data root (overrides the default under the data root).
pub const ENV_CHROMA_DATA_PATH: &str = "CHROMA_DATA_PATH";
/// Env var: enable manifest-driven initialization.
pub const ENV_USE_MANIFEST: &str = "DMMS_USE_MANIFEST";
/// Env var: manifest init mode (`auto` | `manual` | `disabled`).
pub const ENV_INIT_MODE: &str = "DMMS_INIT_MODE";
/// Env var: explicit project root.
pub const ENV_PROJECT_ROOT: &str = "DMMS_PROJECT_ROOT";
/// Env var: walk up from the working directory to find the project root.
pub const ENV_AUTO_DETECT_PROJECT_ROOT: &str = "DMMS_AUTO_DETECT_PROJECT_ROOT";

/// Env var: enable logging.
pub const ENV_ENABLE_LOGGING: &str = "ENABLE_LOGGING";
/// Env var: minimum log level.
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
/// Env var: log file name (stderr when unset).
pub const ENV_LOG_FILE_NAME: &str = "LOG_FILE_NAME";

/// Removed variables that must never be honored. Branch/commit targeting
/// lives solely in the manifest.
pub const REMOVED_ENV_VARS: &[&str] = &["DMMS_TARGET_BRANCH", "DMMS_TARGET_COMMIT"];

/// Parse a boolean env value.
pub fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid_env(name, value, "expected a boolean")),
    }
}

/// Parse a positive seconds value.
pub fn parse_seconds(name: &str, value: &str) -> Result<u64> {
    let parsed: u64 = value
        .trim()
        .parse()
        .map_err(|_| invalid_env(name, value, "expected a positive integer"))?;
    if parsed == 0 {
        return Err(invalid_env(name, value, "expected a positive integer"));
    }
    Ok(parsed)
}

/// Build an invalid-env error with the variable name attached.
pub fn invalid_env(name: &str, value: &str, detail: &str) -> ErrorEnvelope {
    ErrorEnvelope::expected(
        ErrorCode::invalid_input(),
        format!("invalid value for {name}: {detail}"),
    )
    .with_metadata("env_var", name)
    .with_metadata("value", value)
}
