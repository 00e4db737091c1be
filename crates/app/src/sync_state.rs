//! Sync-state checker: local Dolt HEAD vs the manifest.
//!
//! The result is cached per process. The cache must be invalidated by every
//! driver call that can move HEAD (checkout, commit, pull, merge, reset,
//! init, clone) and by every manifest write; the engine does so before the
//! write-path mutex is released.

use embranch_domain::{SyncStateCheck, SyncStateReason};
use embranch_ports::{DoltPort, ManifestPort};
use embranch_shared::{RequestContext, Result};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Per-process sync-state checker with a cached result.
pub struct SyncStateChecker {
    dolt: Arc<dyn DoltPort>,
    manifest: Arc<dyn ManifestPort>,
    cache: RwLock<Option<SyncStateCheck>>,
}

impl SyncStateChecker {
    /// Create a checker over the given ports.
    #[must_use]
    pub fn new(dolt: Arc<dyn DoltPort>, manifest: Arc<dyn ManifestPort>) -> Self {
        Self {
            dolt,
            manifest,
            cache: RwLock::new(None),
        }
    }

    /// Return the cached check, computing it when stale.
    pub async fn check(&self, ctx: &RequestContext) -> Result<SyncStateCheck> {
        if let Some(cached) = self.cache.read().await.clone() {
            return Ok(cached);
        }

        let computed = self.compute(ctx).await?;
        *self.cache.write().await = Some(computed.clone());
        Ok(computed)
    }

    /// Drop the cached result.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    async fn compute(&self, ctx: &RequestContext) -> Result<SyncStateCheck> {
        let manifest = self.manifest.read()?;
        let (manifest_branch, manifest_commit) = manifest
            .as_ref()
            .map(|manifest| {
                (
                    manifest.dolt.current_branch.clone(),
                    manifest.dolt.current_commit.clone(),
                )
            })
            .unwrap_or_default();

        if !self.dolt.is_initialized(ctx).await? {
            return Ok(SyncStateCheck {
                in_sync: false,
                has_local_changes: false,
                local_ahead_of_manifest: false,
                local_branch: None,
                local_commit: None,
                manifest_branch,
                manifest_commit,
                reason: SyncStateReason::RepositoryUnavailable,
            });
        }

        let status = self.dolt.status(ctx).await?;
        let local_commit = self.dolt.head_commit_hash(ctx).await?;
        let local_branch = status.branch.clone();
        let has_local_changes = status.has_changes;

        let branches_match = local_branch == manifest_branch;
        let commits_match = local_commit == manifest_commit;

        let local_ahead_of_manifest = match (&manifest_commit, &local_commit) {
            (Some(manifest_hash), Some(local_hash)) if manifest_hash != local_hash => {
                self.dolt
                    .merge_base(ctx, manifest_hash.clone(), local_hash.clone())
                    .await?
                    .is_some_and(|base| base == *manifest_hash)
            },
            _ => false,
        };

        let in_sync = manifest.is_some() && branches_match && commits_match && !has_local_changes;

        let reason = if manifest.is_none() {
            SyncStateReason::ManifestMissing
        } else if !branches_match {
            SyncStateReason::BranchMismatch
        } else if !commits_match {
            if local_ahead_of_manifest {
                SyncStateReason::LocalAhead
            } else {
                SyncStateReason::CommitMismatch
            }
        } else if has_local_changes {
            SyncStateReason::LocalChanges
        } else {
            SyncStateReason::InSync
        };

        Ok(SyncStateCheck {
            in_sync,
            has_local_changes,
            local_ahead_of_manifest,
            local_branch,
            local_commit,
            manifest_branch,
            manifest_commit,
            reason,
        })
    }
}
