//! Configuration schema with serde defaults.

use embranch_domain::InitMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default external command timeout in seconds.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 60;
/// Default store worker queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
/// Directory under the project root holding embranch state.
pub const STATE_DIR_NAME: &str = ".dmms";

/// Dolt driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DoltConfig {
    /// Explicit repository path; defaults to `<project_root>/.dmms/dolt`.
    pub repository_path: Option<PathBuf>,
    /// Dolt executable; bare name resolves via PATH.
    pub executable_path: PathBuf,
    /// Remote name used for push/pull.
    pub remote_name: String,
    /// Seed remote URL, consulted only when creating the initial manifest.
    pub remote_url: Option<String>,
    /// Per-invocation timeout in seconds.
    pub command_timeout_secs: u64,
}

impl Default for DoltConfig {
    fn default() -> Self {
        Self {
            repository_path: None,
            executable_path: PathBuf::from("dolt"),
            remote_name: "origin".to_owned(),
            remote_url: None,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
        }
    }
}

impl DoltConfig {
    /// Per-invocation timeout as a [`Duration`].
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Vector store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// Embranch data root; defaults to `<project_root>/.dmms`.
    pub data_path: Option<PathBuf>,
    /// Vector store root; defaults to `<data_path>/chroma`.
    pub store_path: Option<PathBuf>,
    /// Bounded worker queue capacity; submissions beyond it fail with Busy.
    pub queue_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            store_path: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Manifest-driven initialization configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManifestConfig {
    /// Whether manifest handling is enabled at all.
    pub use_manifest: bool,
    /// Startup reconciliation mode.
    pub init_mode: InitMode,
    /// Explicit project root; overrides detection.
    pub project_root: Option<PathBuf>,
    /// Walk up from the working directory looking for an existing `.dmms`.
    pub auto_detect_project_root: bool,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            use_manifest: true,
            init_mode: InitMode::Auto,
            project_root: None,
            auto_detect_project_root: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// Whether logging is enabled.
    pub enabled: bool,
    /// Minimum level (`trace|debug|info|warn|error`).
    pub level: String,
    /// Log file name under the data root; stderr when unset.
    pub file_name: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_owned(),
            file_name: None,
        }
    }
}

/// Effective embranch configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbranchConfig {
    /// Dolt driver settings.
    pub dolt: DoltConfig,
    /// Vector store settings.
    pub store: StoreConfig,
    /// Manifest settings.
    pub manifest: ManifestConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

impl EmbranchConfig {
    /// Data root for a given project root.
    #[must_use]
    pub fn data_path(&self, project_root: &Path) -> PathBuf {
        self.store
            .data_path
            .clone()
            .unwrap_or_else(|| project_root.join(STATE_DIR_NAME))
    }

    /// Vector store root for a given project root.
    #[must_use]
    pub fn store_path(&self, project_root: &Path) -> PathBuf {
        self.store
            .store_path
            .clone()
            .unwrap_or_else(|| self.data_path(project_root).join("chroma"))
    }

    /// Dolt repository root for a given project root.
    #[must_use]
    pub fn repository_path(&self, project_root: &Path) -> PathBuf {
        self.dolt
            .repository_path
            .clone()
            .unwrap_or_else(|| self.data_path(project_root).join("dolt"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = EmbranchConfig::default();
        assert_eq!(config.dolt.remote_name, "origin");
        assert_eq!(config.dolt.command_timeout(), Duration::from_secs(60));
        assert_eq!(config.manifest.init_mode, InitMode::Auto);
        assert!(config.manifest.use_manifest);
        assert_eq!(config.store.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn paths_derive_from_project_root() {
        let config = EmbranchConfig::default();
        let root = Path::new("/work/project");
        assert_eq!(config.data_path(root), Path::new("/work/project/.dmms"));
        assert_eq!(
            config.store_path(root),
            Path::new("/work/project/.dmms/chroma")
        );
        assert_eq!(
            config.repository_path(root),
            Path::new("/work/project/.dmms/dolt")
        );
    }

    #[test]
    fn explicit_paths_override_derivation() {
        let mut config = EmbranchConfig::default();
        config.dolt.repository_path = Some(PathBuf::from("/data/repo"));
        config.store.store_path = Some(PathBuf::from("/data/vectors"));
        let root = Path::new("/work/project");
        assert_eq!(config.repository_path(root), Path::new("/data/repo"));
        assert_eq!(config.store_path(root), Path::new("/data/vectors"));
    }
}
