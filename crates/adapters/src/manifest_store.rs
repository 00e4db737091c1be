//! Manifest persistence: `.dmms/state.json`.
//!
//! Writes are atomic (sibling temp file, fsync, rename) and guarded by an
//! OS-level exclusive lock so concurrent embranch processes cannot corrupt
//! the manifest. Unknown fields read from disk are preserved on write.

use embranch_config::STATE_DIR_NAME;
use embranch_domain::{InitMode, Manifest};
use embranch_shared::{ErrorClass, ErrorCode, ErrorEnvelope, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const MANIFEST_FILE_NAME: &str = "state.json";
const LOCK_FILE_NAME: &str = "state.lock";

/// Manifest store rooted at a project directory.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    project_root: PathBuf,
}

impl ManifestStore {
    /// Create a store for the given project root.
    #[must_use]
    pub fn new(project_root: PathBuf) -> Self {
        Self { project_root }
    }

    /// Absolute path of the manifest file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.state_dir().join(MANIFEST_FILE_NAME)
    }

    /// True when a manifest exists on disk.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path().is_file()
    }

    /// Read the manifest, if present.
    pub fn read(&self) -> Result<Option<Manifest>> {
        match fs::read_to_string(self.path()) {
            Ok(contents) => {
                let manifest = serde_json::from_str(&contents).map_err(|error| {
                    ErrorEnvelope::unexpected(
                        ErrorCode::corrupt(),
                        format!("manifest parse failed: {error}"),
                        ErrorClass::NonRetriable,
                    )
                    .with_metadata("path", self.path().display().to_string())
                    .with_action_required(
                        "restore .dmms/state.json from backup or delete it to re-initialize",
                    )
                })?;
                Ok(Some(manifest))
            },
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(ErrorEnvelope::from(error)),
        }
    }

    /// Write the manifest atomically under the exclusive lock.
    pub fn write(&self, manifest: &Manifest) -> Result<()> {
        let _guard = self.lock()?;
        self.write_locked(manifest)
    }

    /// Create a default manifest; never overwrites an existing one.
    pub fn create_default(
        &self,
        remote_url: Option<String>,
        default_branch: Option<String>,
        init_mode: InitMode,
    ) -> Result<Manifest> {
        let _guard = self.lock()?;
        if self.exists() {
            return Err(ErrorEnvelope::invariant(
                ErrorCode::already_initialized(),
                "manifest already exists; create_default must not overwrite it",
            )
            .with_metadata("path", self.path().display().to_string()));
        }

        let manifest = Manifest::new_default(remote_url, default_branch, init_mode);
        self.write_locked(&manifest)?;
        Ok(manifest)
    }

    /// Update tracked Dolt state in a read-modify-write cycle.
    pub fn update_dolt_state(
        &self,
        commit: Option<String>,
        branch: Option<String>,
    ) -> Result<Manifest> {
        self.modify(|manifest| manifest.update_dolt_state(commit.clone(), branch.clone()))
    }

    /// Set the canonical remote URL.
    pub fn set_remote(&self, url: String) -> Result<Manifest> {
        self.modify(|manifest| manifest.set_remote(url.clone()))
    }

    /// Apply `mutate` to the stored manifest under the lock.
    pub fn modify(&self, mutate: impl Fn(&mut Manifest)) -> Result<Manifest> {
        let _guard = self.lock()?;
        let Some(mut manifest) = self.read()? else {
            return Err(ErrorEnvelope::expected(
                ErrorCode::not_initialized(),
                "no manifest exists for this project",
            )
            .with_metadata("path", self.path().display().to_string())
            .with_action_required("run initialization first (or enable DMMS_USE_MANIFEST)"));
        };
        mutate(&mut manifest);
        self.write_locked(&manifest)?;
        Ok(manifest)
    }

    fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR_NAME)
    }

    fn lock(&self) -> Result<ManifestLock> {
        fs::create_dir_all(self.state_dir())?;
        let lock_path = self.state_dir().join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        file.lock_exclusive()?;
        Ok(ManifestLock { file })
    }

    fn write_locked(&self, manifest: &Manifest) -> Result<()> {
        let state_dir = self.state_dir();
        fs::create_dir_all(&state_dir)?;

        let mut payload = serde_json::to_string_pretty(manifest)?;
        payload.push('\n');

        let temp_path = state_dir.join(format!(
            "{MANIFEST_FILE_NAME}.tmp-{}",
            std::process::id()
        ));
        {
            let mut temp = File::create(&temp_path)?;
            temp.write_all(payload.as_bytes())?;
            temp.sync_all()?;
        }
        fs::rename(&temp_path, self.path())?;
        Ok(())
    }
}

impl embranch_ports::ManifestPort for ManifestStore {
    fn path(&self) -> PathBuf {
        Self::path(self)
    }

    fn exists(&self) -> bool {
        Self::exists(self)
    }

    fn read(&self) -> Result<Option<Manifest>> {
        Self::read(self)
    }

    fn write(&self, manifest: &Manifest) -> Result<()> {
        Self::write(self, manifest)
    }

    fn create_default(
        &self,
        remote_url: Option<String>,
        default_branch: Option<String>,
        init_mode: InitMode,
    ) -> Result<Manifest> {
        Self::create_default(self, remote_url, default_branch, init_mode)
    }

    fn update_dolt_state(
        &self,
        commit: Option<String>,
        branch: Option<String>,
    ) -> Result<Manifest> {
        Self::update_dolt_state(self, commit, branch)
    }

    fn set_remote(&self, url: String) -> Result<Manifest> {
        Self::set_remote(self, url)
    }
}

/// Held for the duration of a manifest write; unlocks on drop.
struct ManifestLock {
    file: File,
}

impl Drop for ManifestLock {
    fn drop(&mut self) {
        // Dropping the file releases the lock anyway; unlock early for clarity.
        let _ = fs2::FileExt::unlock(&self.file);
    }
}
