//! Tool-surface DTO types.

use embranch_domain::{SyncStateCheck, SyncStateReason};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error payload attached to failed tool responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolError {
    /// Stable error tag (e.g. `REMOTE_REJECTED`).
    pub error: String,
    /// Human-readable message.
    pub message: String,
    /// Suggested recovery steps, when known.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

/// Branch/commit pair used in warnings and status payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSummary {
    /// Branch, when attached.
    pub branch: Option<String>,
    /// Commit hash, when any commit exists.
    pub commit: Option<String>,
}

/// Out-of-sync warning attached to mutating tool responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmmsWarning {
    /// Warning discriminator; always `out_of_sync`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable summary.
    pub message: String,
    /// Local Dolt state.
    pub local_state: StateSummary,
    /// Manifest-tracked state.
    pub manifest_state: StateSummary,
    /// Suggested recovery step.
    pub action_required: String,
}

impl DmmsWarning {
    /// Build a warning from a sync-state check.
    #[must_use]
    pub fn from_check(check: &SyncStateCheck) -> Self {
        let action_required = match check.reason {
            SyncStateReason::LocalChanges => {
                "commit local changes, then push or checkout".to_owned()
            },
            SyncStateReason::LocalAhead => "push local commits to the remote".to_owned(),
            SyncStateReason::ManifestMissing => {
                "run initialization to create the manifest".to_owned()
            },
            SyncStateReason::RepositoryUnavailable => {
                "configure a remote and clone the repository".to_owned()
            },
            _ => "checkout the manifest branch/commit or update the manifest".to_owned(),
        };
        Self {
            kind: "out_of_sync".to_owned(),
            message: format!("local state diverges from manifest: {}", check.reason),
            local_state: StateSummary {
                branch: check.local_branch.clone(),
                commit: check.local_commit.clone(),
            },
            manifest_state: StateSummary {
                branch: check.manifest_branch.clone(),
                commit: check.manifest_commit.clone(),
            },
            action_required,
        }
    }
}

/// Envelope for every tool response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// True on success.
    pub success: bool,
    /// Success payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure payload, flattened into the envelope.
    #[serde(flatten)]
    pub error: Option<ToolError>,
    /// Out-of-sync warning (mutating tools only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dmms_warning: Option<DmmsWarning>,
}

impl ToolResponse {
    /// Build a success envelope around a serializable payload.
    pub fn ok<T: Serialize>(payload: &T) -> Self {
        Self {
            success: true,
            result: serde_json::to_value(payload).ok(),
            error: None,
            dmms_warning: None,
        }
    }

    /// Build a failure envelope.
    #[must_use]
    pub fn err(error: ToolError) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error),
            dmms_warning: None,
        }
    }

    /// Attach an out-of-sync warning.
    #[must_use]
    pub fn with_warning(mut self, warning: Option<DmmsWarning>) -> Self {
        self.dmms_warning = warning;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

/// Request: create a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreateCollectionRequest {
    /// Collection name (unique, case-sensitive).
    pub name: String,
    /// Optional collection metadata.
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Request: delete a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeleteCollectionRequest {
    /// Collection name.
    pub name: String,
}

/// Request: list collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListCollectionsRequest {
    /// Maximum number of entries.
    #[serde(default)]
    pub limit: Option<u32>,
    /// Entries to skip.
    #[serde(default)]
    pub offset: Option<u32>,
}

/// One document in an add request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AddDocumentItem {
    /// Document id, unique within the collection.
    pub id: String,
    /// Text content.
    pub content: String,
    /// Optional JSON-object metadata.
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Request: add documents to a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AddDocumentsRequest {
    /// Target collection.
    pub collection: String,
    /// Documents to add.
    pub documents: Vec<AddDocumentItem>,
    /// Overwrite existing ids instead of failing.
    #[serde(default)]
    pub upsert: bool,
}

/// Request: fetch documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GetDocumentsRequest {
    /// Target collection.
    pub collection: String,
    /// Restrict to these ids.
    #[serde(default)]
    pub ids: Option<Vec<String>>,
    /// Metadata equality filter.
    #[serde(default)]
    pub where_filter: Option<Value>,
    /// Content filter (`{"$contains": "text"}`).
    #[serde(default)]
    pub where_document: Option<Value>,
}

/// Request: similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueryDocumentsRequest {
    /// Target collection.
    pub collection: String,
    /// Query texts; one ranked result list is returned per text.
    pub query_texts: Vec<String>,
    /// Results per query (default 5).
    #[serde(default)]
    pub n_results: Option<u32>,
    /// Metadata equality filter.
    #[serde(default)]
    pub where_filter: Option<Value>,
    /// Content filter (`{"$contains": "text"}`).
    #[serde(default)]
    pub where_document: Option<Value>,
}

/// Request: update documents in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UpdateDocumentsRequest {
    /// Target collection.
    pub collection: String,
    /// Ids to update.
    pub ids: Vec<String>,
    /// New contents, aligned with `ids`.
    #[serde(default)]
    pub contents: Option<Vec<String>>,
    /// New metadata values, aligned with `ids`.
    #[serde(default)]
    pub metadatas: Option<Vec<Value>>,
}

/// Request: delete documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeleteDocumentsRequest {
    /// Target collection.
    pub collection: String,
    /// Ids to delete.
    pub ids: Vec<String>,
}

/// Request: push local changes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct PushRequest {
    /// Remote name; defaults to the configured remote.
    #[serde(default)]
    pub remote: Option<String>,
    /// Branch; defaults to the current branch.
    #[serde(default)]
    pub branch: Option<String>,
}

/// Request: pull remote changes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct PullRequest {
    /// Remote name; defaults to the configured remote.
    #[serde(default)]
    pub remote: Option<String>,
    /// Branch; defaults to the current branch.
    #[serde(default)]
    pub branch: Option<String>,
}

/// Request: checkout a ref.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CheckoutRequest {
    /// Branch or commit to switch to.
    pub reference: String,
    /// Create the ref as a new branch.
    #[serde(default)]
    pub create_branch: bool,
}

/// Request: set the canonical remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SetRemoteRequest {
    /// Remote URL.
    pub url: String,
}

/// Request: clone a remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CloneRequest {
    /// Remote URL; defaults to the manifest remote.
    #[serde(default)]
    pub url: Option<String>,
    /// Replace an existing empty repository.
    #[serde(default)]
    pub force: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────────────────────────────────

/// Response payload: a stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDto {
    /// Document id.
    pub id: String,
    /// Collection name.
    pub collection: String,
    /// Text content.
    pub content: String,
    /// Metadata, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Response payload: a similarity match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatchDto {
    /// Matched document.
    #[serde(flatten)]
    pub document: DocumentDto,
    /// Cosine similarity score.
    pub score: f32,
}

/// Response payload: a collection descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDto {
    /// Collection name.
    pub name: String,
    /// Collection metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Embedding function tag.
    pub embedding_function_name: String,
}

/// Response payload: push summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSummaryDto {
    /// Classified outcome kind (e.g. `commit_range`, `up_to_date`).
    pub outcome: Value,
    /// Commits pushed (`-1` when unknown).
    pub commits_pushed: i64,
    /// Documents flushed into Dolt before the push.
    pub flushed: usize,
    /// HEAD after the flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_commit: Option<String>,
    /// Human-readable summary.
    pub message: String,
}

/// Response payload: pull/checkout replay summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySummaryDto {
    /// Rows added to the store.
    pub added: usize,
    /// Rows updated in the store.
    pub updated: usize,
    /// Rows removed from the store.
    pub deleted: usize,
    /// HEAD after the flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_commit: Option<String>,
}

/// Response payload: sync status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatusDto {
    /// Full sync-state check.
    #[serde(flatten)]
    pub check: SyncStateCheck,
    /// Manifest path for operator action.
    pub manifest_path: String,
}
