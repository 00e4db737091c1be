//! Pull flow: fetch, merge, and replay Dolt-side changes into the store.

use crate::documents_table;
use crate::sync_state::SyncStateChecker;
use embranch_domain::{CollectionName, Document, DocumentRef, metadata_equal};
use embranch_ports::{
    DocumentInput, DoltCommandResult, DoltPort, LogFields, LoggerPort, ManifestPort,
    VectorStorePort,
};
use embranch_shared::{
    ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result, RetryPolicy, retry_async,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Dependencies for the pull flow.
#[derive(Clone)]
pub struct ProcessPullDeps {
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

/// Input for the pull flow.
#[derive(Debug, Clone)]
pub struct ProcessPullInput {
    /// Remote name to pull from.
    pub remote: String,
    /// Branch to pull.
    pub branch: String,
}

/// Per-store replay counts applied after a pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplayCounts {
    /// Rows added to the store.
    pub added: usize,
    /// Rows updated in the store.
    pub updated: usize,
    /// Rows removed from the store.
    pub deleted: usize,
}

/// Output of a successful pull flow.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessPullOutput {
    /// Replay summary.
    pub replayed: ReplayCounts,
    /// HEAD after the pull.
    pub head_commit: Option<String>,
}

/// Fetch and pull, then replay the `documents` diff into the store.
///
/// A merge conflict aborts the flow; the manifest is not updated until the
/// operator commits the resolved state.
pub async fn process_pull(
    ctx: &RequestContext,
    deps: &ProcessPullDeps,
    input: ProcessPullInput,
) -> Result<ProcessPullOutput> {
    ctx.ensure_not_cancelled("process_pull")?;
    ensure_repository(ctx, &deps.dolt).await?;

    let before = snapshot_documents(ctx, deps).await?;

    run_transient(ctx, "process_pull.fetch", || {
        let dolt = Arc::clone(&deps.dolt);
        let remote = input.remote.clone();
        let ctx = ctx.clone();
        async move { dolt.fetch(&ctx, remote).await }
    })
    .await?;

    let pull_result = run_transient(ctx, "process_pull.pull", || {
        let dolt = Arc::clone(&deps.dolt);
        let remote = input.remote.clone();
        let branch = input.branch.clone();
        let ctx = ctx.clone();
        async move { dolt.pull(&ctx, remote, branch).await }
    })
    .await?;
    deps.checker.invalidate().await;

    if !pull_result.success {
        return Err(classify_pull_failure(&pull_result));
    }

    let after = snapshot_documents(ctx, deps).await?;
    let replayed = replay_into_store(ctx, deps, &before, &after).await?;

    let head_commit = deps.dolt.head_commit_hash(ctx).await?;
    update_manifest_if_changed(deps, head_commit.clone()).await?;
    deps.checker.invalidate().await;

    if let Some(logger) = deps.logger.as_ref() {
        let mut fields = LogFields::new();
        fields.insert("added".into(), replayed.added.into());
        fields.insert("updated".into(), replayed.updated.into());
        fields.insert("deleted".into(), replayed.deleted.into());
        logger.info("process_pull.done", "pull replayed into store", Some(fields));
    }

    Ok(ProcessPullOutput {
        replayed,
        head_commit,
    })
}

/// Replay a `documents` table diff (before vs after) into the store.
///
/// Added and changed rows are upserted; removed rows are deleted. Used by
/// both the pull and checkout flows.
pub async fn replay_into_store(
    ctx: &RequestContext,
    deps: &ProcessPullDeps,
    before: &[Document],
    after: &[Document],
) -> Result<ReplayCounts> {
    let before_by_key: BTreeMap<DocumentRef, &Document> =
        before.iter().map(|doc| (doc.as_ref_key(), doc)).collect();
    let after_by_key: BTreeMap<DocumentRef, &Document> =
        after.iter().map(|doc| (doc.as_ref_key(), doc)).collect();

    let mut upserts: BTreeMap<CollectionName, Vec<DocumentInput>> = BTreeMap::new();
    let mut deletions: BTreeMap<CollectionName, Vec<embranch_domain::DocumentId>> =
        BTreeMap::new();
    let mut counts = ReplayCounts::default();

    for (key, after_doc) in &after_by_key {
        let changed = match before_by_key.get(key) {
            None => {
                counts.added += 1;
                true
            },
            Some(before_doc) => {
                let differs = before_doc.content != after_doc.content
                    || !metadata_equal(before_doc.metadata.as_ref(), after_doc.metadata.as_ref());
                if differs {
                    counts.updated += 1;
                }
                differs
            },
        };
        if changed {
            upserts.entry(key.collection.clone()).or_default().push(DocumentInput {
                id: key.id.clone(),
                content: after_doc.content.clone(),
                metadata: after_doc.metadata.clone(),
            });
        }
    }

    for key in before_by_key.keys() {
        if !after_by_key.contains_key(key) {
            counts.deleted += 1;
            deletions
                .entry(key.collection.clone())
                .or_default()
                .push(key.id.clone());
        }
    }

    let existing: BTreeSet<CollectionName> = deps
        .store
        .list_collections(ctx, None, None)
        .await?
        .into_iter()
        .map(|info| info.name)
        .collect();

    let mut touched: BTreeSet<CollectionName> = BTreeSet::new();

    for (collection, documents) in upserts {
        if !existing.contains(&collection) {
            deps.store
                .create_collection(ctx, collection.clone(), None)
                .await?;
        }
        deps.store
            .add_documents(ctx, collection.clone(), documents, true)
            .await?;
        touched.insert(collection);
    }

    for (collection, ids) in deletions {
        if existing.contains(&collection) {
            deps.store
                .delete_documents(ctx, collection.clone(), ids)
                .await?;
            touched.insert(collection);
        }
    }

    for collection in touched {
        deps.dolt
            .execute(ctx, documents_table::sync_log_sql(&collection, "pull"))
            .await?;
    }

    Ok(counts)
}

/// Read the full documents table, treating a missing schema as empty.
pub async fn snapshot_documents(
    ctx: &RequestContext,
    deps: &ProcessPullDeps,
) -> Result<Vec<Document>> {
    if !documents_table::schema_exists(ctx, &deps.dolt).await? {
        return Ok(Vec::new());
    }
    documents_table::read_all_documents(ctx, &deps.dolt).await
}

async fn ensure_repository(ctx: &RequestContext, dolt: &Arc<dyn DoltPort>) -> Result<()> {
    if dolt.is_initialized(ctx).await? {
        Ok(())
    } else {
        Err(ErrorEnvelope::expected(
            ErrorCode::not_initialized(),
            "no local Dolt repository exists",
        )
        .with_action_required("configure a remote (set_remote) and clone first"))
    }
}

async fn run_transient<F, Fut>(
    ctx: &RequestContext,
    operation: &'static str,
    make: F,
) -> Result<DoltCommandResult>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<DoltCommandResult>>,
{
    retry_async(ctx, RetryPolicy::transient(), operation, || {
        let fut = make();
        async move {
            let result = fut.await?;
            if !result.success && looks_transient(&result.stderr) {
                return Err(ErrorEnvelope::unexpected(
                    ErrorCode::network(),
                    first_line(&result.stderr),
                    ErrorClass::Retriable,
                ));
            }
            Ok(result)
        }
    })
    .await
}

fn classify_pull_failure(result: &DoltCommandResult) -> ErrorEnvelope {
    let lowered = result.stderr.to_ascii_lowercase();
    let lowered_out = result.stdout.to_ascii_lowercase();
    if lowered.contains("conflict") || lowered_out.contains("conflict") {
        return ErrorEnvelope::expected(ErrorCode::conflict(), "merge conflict during pull")
            .with_metadata("stderr", result.stderr.trim().to_owned())
            .with_action_required("resolve conflicts, commit the result, then retry");
    }
    if lowered.contains("could not resolve host") || lowered.contains("unreachable") {
        return ErrorEnvelope::unexpected(
            ErrorCode::network(),
            first_line(&result.stderr),
            ErrorClass::Retriable,
        )
        .with_action_required("check connectivity to the remote and retry");
    }
    ErrorEnvelope::unexpected(
        ErrorCode::new("dolt", "command_failed"),
        format!("pull failed: {}", first_line(&result.stderr)),
        ErrorClass::NonRetriable,
    )
    .with_metadata("stderr", result.stderr.trim().to_owned())
}

fn looks_transient(stderr: &str) -> bool {
    let lowered = stderr.to_ascii_lowercase();
    ["could not resolve host", "timeout", "unreachable"]
        .iter()
        .any(|needle| lowered.contains(needle))
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or("").trim().to_owned()
}

async fn update_manifest_if_changed(
    deps: &ProcessPullDeps,
    commit: Option<String>,
) -> Result<()> {
    let Some(current) = deps.manifest.read()? else {
        return Ok(());
    };
    if current.dolt.current_commit == commit {
        return Ok(());
    }
    deps.manifest.update_dolt_state(commit, None)?;
    Ok(())
}
