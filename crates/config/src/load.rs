//! Env-to-config merging and project root resolution.

use crate::env::{self, REMOVED_ENV_VARS};
use crate::schema::{EmbranchConfig, STATE_DIR_NAME};
use embranch_domain::InitMode;
use embranch_shared::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use url::Url;

/// Result of loading configuration from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    /// Effective configuration.
    pub config: EmbranchConfig,
    /// Recognized-but-removed variables that were present and ignored.
    pub ignored_vars: Vec<String>,
}

/// Merge environment overrides into the default configuration.
///
/// Values are parsed strictly; the first invalid value aborts the load.
/// `DMMS_TARGET_BRANCH`/`DMMS_TARGET_COMMIT` are reported in `ignored_vars`
/// but never honored.
pub fn load_from_env(environ: &BTreeMap<String, String>) -> Result<LoadedConfig> {
    let mut config = EmbranchConfig::default();

    if let Some(value) = non_empty(environ, env::ENV_DOLT_REPOSITORY_PATH) {
        config.dolt.repository_path = Some(PathBuf::from(value));
    }
    if let Some(value) = non_empty(environ, env::ENV_DOLT_REMOTE_URL) {
        Url::parse(value)
            .map_err(|error| env::invalid_env(env::ENV_DOLT_REMOTE_URL, value, &error.to_string()))?;
        config.dolt.remote_url = Some(value.to_owned());
    }
    if let Some(value) = non_empty(environ, env::ENV_DOLT_EXECUTABLE_PATH) {
        config.dolt.executable_path = PathBuf::from(value);
    }
    if let Some(value) = non_empty(environ, env::ENV_DOLT_REMOTE_NAME) {
        config.dolt.remote_name = value.to_owned();
    }
    if let Some(value) = non_empty(environ, env::ENV_DOLT_COMMAND_TIMEOUT) {
        config.dolt.command_timeout_secs =
            env::parse_seconds(env::ENV_DOLT_COMMAND_TIMEOUT, value)?;
    }

    if let Some(value) = non_empty(environ, env::ENV_DATA_PATH) {
        config.store.data_path = Some(PathBuf::from(value));
    }
    if let Some(value) = non_empty(environ, env::ENV_CHROMA_DATA_PATH) {
        config.store.store_path = Some(PathBuf::from(value));
    }

    if let Some(value) = non_empty(environ, env::ENV_USE_MANIFEST) {
        config.manifest.use_manifest = env::parse_bool(env::ENV_USE_MANIFEST, value)?;
    }
    if let Some(value) = non_empty(environ, env::ENV_INIT_MODE) {
        config.manifest.init_mode = InitMode::parse(value)
            .ok_or_else(|| env::invalid_env(env::ENV_INIT_MODE, value, "expected auto|manual|disabled"))?;
    }
    if let Some(value) = non_empty(environ, env::ENV_PROJECT_ROOT) {
        config.manifest.project_root = Some(PathBuf::from(value));
    }
    if let Some(value) = non_empty(environ, env::ENV_AUTO_DETECT_PROJECT_ROOT) {
        config.manifest.auto_detect_project_root =
            env::parse_bool(env::ENV_AUTO_DETECT_PROJECT_ROOT, value)?;
    }

    if let Some(value) = non_empty(environ, env::ENV_ENABLE_LOGGING) {
        config.logging.enabled = env::parse_bool(env::ENV_ENABLE_LOGGING, value)?;
    }
    if let Some(value) = non_empty(environ, env::ENV_LOG_LEVEL) {
        config.logging.level = value.to_ascii_lowercase();
    }
    if let Some(value) = non_empty(environ, env::ENV_LOG_FILE_NAME) {
        config.logging.file_name = Some(value.to_owned());
    }

    let ignored_vars = REMOVED_ENV_VARS
        .iter()
        .filter(|name| environ.contains_key(**name))
        .map(|name| (*name).to_owned())
        .collect();

    Ok(LoadedConfig {
        config,
        ignored_vars,
    })
}

/// Resolve the project root for this process.
///
/// Priority: explicit configuration, then (when auto-detection is on) the
/// nearest ancestor of `cwd` containing a `.dmms` directory, then `cwd`.
#[must_use]
pub fn resolve_project_root(config: &EmbranchConfig, cwd: &Path) -> PathBuf {
    if let Some(explicit) = &config.manifest.project_root {
        return explicit.clone();
    }

    if config.manifest.auto_detect_project_root {
        let mut candidate = Some(cwd);
        while let Some(dir) = candidate {
            if dir.join(STATE_DIR_NAME).is_dir() {
                return dir.to_path_buf();
            }
            candidate = dir.parent();
        }
    }

    cwd.to_path_buf()
}

fn non_empty<'e>(environ: &'e BTreeMap<String, String>, name: &str) -> Option<&'e str> {
    environ
        .get(name)
        .map(String::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
