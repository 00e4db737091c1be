//! Manifest persistence boundary contract.
//!
//! Manifest I/O is synchronous: a handful of small local file operations
//! guarded by an OS lock.

use embranch_domain::{InitMode, Manifest};
use embranch_shared::Result;
use std::path::PathBuf;

/// Boundary contract for reading and writing the project manifest.
pub trait ManifestPort: Send + Sync {
    /// Absolute path of the manifest file.
    fn path(&self) -> PathBuf;

    /// True when a manifest exists on disk.
    fn exists(&self) -> bool;

    /// Read the manifest, if present.
    fn read(&self) -> Result<Option<Manifest>>;

    /// Write the manifest atomically.
    fn write(&self, manifest: &Manifest) -> Result<()>;

    /// Create a default manifest; must never overwrite an existing one.
    fn create_default(
        &self,
        remote_url: Option<String>,
        default_branch: Option<String>,
        init_mode: InitMode,
    ) -> Result<Manifest>;

    /// Update tracked Dolt state in a read-modify-write cycle.
    fn update_dolt_state(
        &self,
        commit: Option<String>,
        branch: Option<String>,
    ) -> Result<Manifest>;

    /// Set the canonical remote URL.
    fn set_remote(&self, url: String) -> Result<Manifest>;
}
