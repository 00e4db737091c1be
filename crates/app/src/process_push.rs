//! Push flow: flush local store changes into Dolt, commit, push.

use crate::change_detection::{ChangeDetectorDeps, detect_changes};
use crate::documents_table;
use crate::sync_state::SyncStateChecker;
use embranch_domain::{CollectionName, LocalChanges, PushOutcome, PushReport, analyze_push};
use embranch_ports::{DoltPort, LogFields, LoggerPort, ManifestPort, VectorStorePort};
use embranch_shared::{
    ErrorClass, ErrorEnvelope, RequestContext, Result, RetryPolicy, retry_async,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Dependencies for the push flow.
#[derive(Clone)]
pub struct ProcessPushDeps {
    /// Dolt driver.
    pub dolt: Arc<dyn DoltPort>,
    /// Vector store gateway.
    pub store: Arc<dyn VectorStorePort>,
    /// Manifest persistence.
    pub manifest: Arc<dyn ManifestPort>,
    /// Sync-state checker (invalidated on HEAD movement).
    pub checker: Arc<SyncStateChecker>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
}

/// Input for the push flow.
#[derive(Debug, Clone)]
pub struct ProcessPushInput {
    /// Remote name to push to.
    pub remote: String,
    /// Branch to push.
    pub branch: String,
}

/// Output of a successful push flow.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessPushOutput {
    /// Classified push report.
    pub report: PushReport,
    /// Changes that were flushed into Dolt before pushing.
    pub flushed: LocalChanges,
    /// True when a commit was created for the flushed changes.
    pub committed: bool,
    /// HEAD after the flow.
    pub head_commit: Option<String>,
}

/// Flush local store changes into Dolt as a commit, then push.
///
/// Rejections and remote failures never alter the manifest; transient
/// network failures and driver timeouts are retried with backoff.
pub async fn process_push(
    ctx: &RequestContext,
    deps: &ProcessPushDeps,
    input: ProcessPushInput,
) -> Result<ProcessPushOutput> {
    ctx.ensure_not_cancelled("process_push")?;
    ensure_repository(ctx, &deps.dolt).await?;

    documents_table::ensure_schema(ctx, &deps.dolt).await?;
    let detection = detect_changes(
        ctx,
        &ChangeDetectorDeps {
            dolt: Arc::clone(&deps.dolt),
            store: Arc::clone(&deps.store),
            logger: deps.logger.clone(),
        },
    )
    .await?;
    let changes = detection.changes;

    let committed = if changes.is_empty() {
        false
    } else {
        flush_changes(ctx, deps, &changes).await?;
        true
    };

    let report = push_with_retry(ctx, deps, &input).await?;

    if let Some(code) = report.outcome.error_code() {
        // Failed pushes leave local state (and the manifest) untouched.
        let error = ErrorEnvelope::expected(code, report.message.clone())
            .with_metadata("remote", input.remote.clone())
            .with_metadata("branch", input.branch.clone());
        let error = match report.outcome {
            PushOutcome::Rejected { .. } => {
                error.with_action_required("Pull first to get remote changes")
            },
            PushOutcome::AuthFailed => {
                error.with_action_required("update the stored credentials for the remote")
            },
            PushOutcome::PermissionDenied => {
                error.with_action_required("verify the account has write access to the repository")
            },
            PushOutcome::RepositoryNotFound => {
                error.with_action_required("verify the remote URL (set_remote) and try again")
            },
            _ => error.with_action_required("check connectivity to the remote and retry"),
        };
        return Err(error);
    }

    let head_commit = deps.dolt.head_commit_hash(ctx).await?;
    update_manifest_if_changed(deps, head_commit.clone(), Some(input.branch.clone()))?;
    deps.checker.invalidate().await;

    if let Some(logger) = deps.logger.as_ref() {
        let mut fields = LogFields::new();
        fields.insert("remote".into(), input.remote.clone().into());
        fields.insert("branch".into(), input.branch.clone().into());
        fields.insert("flushed".into(), changes.len().into());
        logger.info("process_push.done", &report.message, Some(fields));
    }

    Ok(ProcessPushOutput {
        report,
        flushed: changes,
        committed,
        head_commit,
    })
}

/// Apply detected changes to the documents table and commit them.
async fn flush_changes(
    ctx: &RequestContext,
    deps: &ProcessPushDeps,
    changes: &LocalChanges,
) -> Result<()> {
    for document in changes.added.iter().chain(&changes.modified) {
        deps.dolt
            .execute(ctx, documents_table::upsert_document_sql(document))
            .await?;
    }
    for reference in &changes.deleted {
        deps.dolt
            .execute(ctx, documents_table::delete_document_sql(reference))
            .await?;
    }
    for collection in affected_collections(changes) {
        deps.dolt
            .execute(ctx, documents_table::sync_log_sql(&collection, "push"))
            .await?;
    }

    deps.dolt.add_all(ctx).await?;
    deps.dolt.commit(ctx, changes.summary()).await?;
    deps.checker.invalidate().await;
    Ok(())
}

/// Push and classify, retrying transient failures.
async fn push_with_retry(
    ctx: &RequestContext,
    deps: &ProcessPushDeps,
    input: &ProcessPushInput,
) -> Result<PushReport> {
    retry_async(ctx, RetryPolicy::transient(), "process_push.push", || {
        let dolt = Arc::clone(&deps.dolt);
        let remote = input.remote.clone();
        let branch = input.branch.clone();
        let ctx = ctx.clone();
        async move {
            let result = dolt.push(&ctx, remote, branch, false).await?;
            let report = analyze_push(result.success, &result.stdout, &result.stderr);
            if report.outcome == PushOutcome::NetworkError {
                // Surface as retriable so the policy re-attempts it.
                return Err(ErrorEnvelope::unexpected(
                    embranch_shared::ErrorCode::network(),
                    report.message.clone(),
                    ErrorClass::Retriable,
                ));
            }
            Ok(report)
        }
    })
    .await
    .map_err(|error| {
        if error.code == embranch_shared::ErrorCode::network() {
            error.with_action_required("check connectivity to the remote and retry")
        } else {
            error
        }
    })
}

/// Write the manifest only when the tracked state actually moved; repeated
/// pushes with no intervening changes leave it byte-identical.
fn update_manifest_if_changed(
    deps: &ProcessPushDeps,
    commit: Option<String>,
    branch: Option<String>,
) -> Result<()> {
    let Some(current) = deps.manifest.read()? else {
        // Manifest mode disabled for this workstation; nothing to track.
        return Ok(());
    };
    if current.dolt.current_commit == commit && current.dolt.current_branch == branch {
        return Ok(());
    }
    deps.manifest.update_dolt_state(commit, branch)?;
    Ok(())
}

/// Refuse to run against a missing repository.
async fn ensure_repository(ctx: &RequestContext, dolt: &Arc<dyn DoltPort>) -> Result<()> {
    if dolt.is_initialized(ctx).await? {
        Ok(())
    } else {
        Err(ErrorEnvelope::expected(
            embranch_shared::ErrorCode::not_initialized(),
            "no local Dolt repository exists",
        )
        .with_action_required("configure a remote (set_remote) and clone first"))
    }
}

fn affected_collections(changes: &LocalChanges) -> BTreeSet<CollectionName> {
    changes
        .added
        .iter()
        .chain(&changes.modified)
        .map(|doc| doc.collection.clone())
        .chain(changes.deleted.iter().map(|key| key.collection.clone()))
        .collect()
}
