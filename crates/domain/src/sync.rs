//! Sync-state classification and local change sets.

use crate::{Document, DocumentRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why local state does or does not match the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStateReason {
    /// Local branch and commit match the manifest.
    InSync,
    /// Local branch differs from the manifest branch.
    BranchMismatch,
    /// Branches match but commits differ.
    CommitMismatch,
    /// The working tree has uncommitted changes.
    LocalChanges,
    /// The local commit is a descendant of the manifest commit.
    LocalAhead,
    /// No manifest exists to compare against.
    ManifestMissing,
    /// The local Dolt repository is missing or unreadable.
    RepositoryUnavailable,
}

impl fmt::Display for SyncStateReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::InSync => "in sync",
            Self::BranchMismatch => "local branch differs from manifest",
            Self::CommitMismatch => "local commit differs from manifest",
            Self::LocalChanges => "working tree has uncommitted changes",
            Self::LocalAhead => "local commits not recorded in manifest",
            Self::ManifestMissing => "manifest missing",
            Self::RepositoryUnavailable => "local repository unavailable",
        };
        formatter.write_str(text)
    }
}

/// Result of comparing local Dolt HEAD against the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStateCheck {
    /// True when local branch+commit equal the manifest's.
    pub in_sync: bool,
    /// True when `dolt status` reports uncommitted rows.
    pub has_local_changes: bool,
    /// True when the manifest commit is a strict ancestor of the local commit.
    pub local_ahead_of_manifest: bool,
    /// Local branch, when attached.
    pub local_branch: Option<String>,
    /// Local HEAD commit, when any commit exists.
    pub local_commit: Option<String>,
    /// Manifest-tracked branch.
    pub manifest_branch: Option<String>,
    /// Manifest-tracked commit.
    pub manifest_commit: Option<String>,
    /// Classification reason.
    pub reason: SyncStateReason,
}

impl SyncStateCheck {
    /// True when a checkout or automatic reconciliation is safe: the working
    /// tree is clean and local history is not ahead of the manifest.
    #[must_use]
    pub const fn safe_to_sync(&self) -> bool {
        !self.has_local_changes && !self.local_ahead_of_manifest
    }
}

/// Detected divergence between the vector store and the Dolt `documents`
/// table: three disjoint sets over documents.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LocalChanges {
    /// Documents present in the store but absent from Dolt.
    pub added: Vec<Document>,
    /// Documents whose content or canonical metadata differs.
    pub modified: Vec<Document>,
    /// Identities present in Dolt but no longer in the store.
    pub deleted: Vec<DocumentRef>,
}

impl LocalChanges {
    /// True when nothing diverges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Total number of divergent documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }

    /// Commit-message summary, e.g. `Sync: 2 added, 1 modified, 3 deleted`.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Sync: {} added, {} modified, {} deleted",
            self.added.len(),
            self.modified.len(),
            self.deleted.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CollectionName, DocumentId};

    fn check(in_sync: bool, local_changes: bool, ahead: bool) -> SyncStateCheck {
        SyncStateCheck {
            in_sync,
            has_local_changes: local_changes,
            local_ahead_of_manifest: ahead,
            local_branch: Some("main".to_owned()),
            local_commit: Some("abcd123".to_owned()),
            manifest_branch: Some("main".to_owned()),
            manifest_commit: Some("abcd123".to_owned()),
            reason: if in_sync {
                SyncStateReason::InSync
            } else {
                SyncStateReason::CommitMismatch
            },
        }
    }

    #[test]
    fn in_sync_implies_safe() {
        // in_sync ⇒ ¬has_local_changes ∧ ¬local_ahead_of_manifest
        let state = check(true, false, false);
        assert!(state.safe_to_sync());
    }

    #[test]
    fn dirty_tree_is_never_safe() {
        assert!(!check(false, true, false).safe_to_sync());
        assert!(!check(false, false, true).safe_to_sync());
    }

    #[test]
    fn change_summary_counts() {
        let doc = Document {
            id: DocumentId::parse("d1").expect("valid"),
            collection: CollectionName::parse("notes").expect("valid"),
            content: "text".to_owned(),
            metadata: None,
        };
        let changes = LocalChanges {
            added: vec![doc.clone(), doc.clone()],
            modified: vec![doc.clone()],
            deleted: vec![doc.as_ref_key()],
        };
        assert_eq!(changes.len(), 4);
        assert!(!changes.is_empty());
        assert_eq!(changes.summary(), "Sync: 2 added, 1 modified, 1 deleted");
    }
}
