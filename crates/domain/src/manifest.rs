//! Project manifest model: `.dmms/state.json`.
//!
//! The manifest is the single source of truth for "which branch/commit should
//! this workstation be on". Unknown fields survive a read/write cycle so
//! newer processes can extend the format without older ones destroying it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Current manifest schema version.
pub const MANIFEST_VERSION: u32 = 1;

/// Default branch name when none is configured.
pub const DEFAULT_BRANCH: &str = "main";

/// Startup behavior when the manifest is absent or diverges from local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitMode {
    /// Create the manifest and reconcile local state automatically.
    Auto,
    /// Never change local state; only report divergence.
    Manual,
    /// Manifest handling disabled entirely.
    Disabled,
}

impl InitMode {
    /// Parse an init mode from its configuration spelling.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "manual" => Some(Self::Manual),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}

impl fmt::Display for InitMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => formatter.write_str("auto"),
            Self::Manual => formatter.write_str("manual"),
            Self::Disabled => formatter.write_str("disabled"),
        }
    }
}

/// Dolt-related manifest state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoltState {
    /// Canonical remote URL; null for strictly local repositories.
    pub remote_url: Option<String>,
    /// Branch this workstation tracks; null iff detached HEAD.
    pub current_branch: Option<String>,
    /// Commit this workstation tracks; null iff the repo has no commits yet.
    pub current_commit: Option<String>,
    /// Branch used when nothing else is specified.
    pub default_branch: String,
    /// Fields written by newer versions, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl DoltState {
    fn new(remote_url: Option<String>, default_branch: String) -> Self {
        Self {
            remote_url,
            current_branch: None,
            current_commit: None,
            default_branch,
            extra: BTreeMap::new(),
        }
    }
}

/// The project-local manifest (`.dmms/state.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Manifest schema version.
    pub version: u32,
    /// Dolt repository state.
    pub dolt: DoltState,
    /// Startup reconciliation mode.
    pub init_mode: InitMode,
    /// Timestamp of the last write (RFC3339).
    pub updated_at: DateTime<Utc>,
    /// Fields written by newer versions, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Manifest {
    /// Build a fresh default manifest.
    ///
    /// Used only when no manifest exists yet; `default_branch` falls back to
    /// [`DEFAULT_BRANCH`] when empty.
    #[must_use]
    pub fn new_default(
        remote_url: Option<String>,
        default_branch: Option<String>,
        init_mode: InitMode,
    ) -> Self {
        let default_branch = default_branch
            .filter(|branch| !branch.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BRANCH.to_owned());
        Self {
            version: MANIFEST_VERSION,
            dolt: DoltState::new(remote_url, default_branch),
            init_mode,
            updated_at: Utc::now(),
            extra: BTreeMap::new(),
        }
    }

    /// Update tracked Dolt state and bump the write timestamp.
    ///
    /// `None` arguments leave the corresponding field untouched; use
    /// [`Manifest::clear_branch`] for an explicit detached-HEAD transition.
    pub fn update_dolt_state(&mut self, commit: Option<String>, branch: Option<String>) {
        if let Some(commit) = commit {
            self.dolt.current_commit = Some(commit);
        }
        if let Some(branch) = branch {
            self.dolt.current_branch = Some(branch);
        }
        self.touch();
    }

    /// Mark the workstation as detached (no tracked branch).
    pub fn clear_branch(&mut self) {
        self.dolt.current_branch = None;
        self.touch();
    }

    /// Set the canonical remote URL.
    pub fn set_remote(&mut self, url: String) {
        self.dolt.remote_url = Some(url);
        self.touch();
    }

    /// Bump `updated_at` to now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Target ref for checkout during initialization: the pinned commit when
    /// present, otherwise the tracked branch, otherwise the default branch.
    #[must_use]
    pub fn checkout_target(&self) -> &str {
        self.dolt
            .current_commit
            .as_deref()
            .or(self.dolt.current_branch.as_deref())
            .unwrap_or(&self.dolt.default_branch)
    }
}
