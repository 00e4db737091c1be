//! Checkout flow: switch refs only when safe, then reconcile the store.

use crate::process_pull::{ProcessPullDeps, ReplayCounts, replay_into_store, snapshot_documents};
use crate::sync_state::SyncStateChecker;
use embranch_ports::{DoltPort, LogFields, LoggerPort, ManifestPort, VectorStorePort};
use embranch_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::sync::Arc;

/// Dependencies for the checkout flow.
#[derive(Clone)]
pub struct ProcessCheckoutDeps {
    /// Dolt driver.
    pub dolt: Arc<dyn DoltPort>,
    /// Vector store gateway.
    pub store: Arc<dyn VectorStorePort>,
    /// Manifest persistence.
    pub manifest: Arc<dyn ManifestPort>,
    /// Sync-state checker (consulted for safety, invalidated after).
    pub checker: Arc<SyncStateChecker>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
}

/// Input for the checkout flow.
#[derive(Debug, Clone)]
pub struct ProcessCheckoutInput {
    /// Ref to switch to (branch or commit).
    pub reference: String,
    /// Create the ref as a new branch.
    pub create_branch: bool,
    /// Skip the working-tree safety check (used by the initializer after it
    /// has already verified safety).
    pub skip_safety_check: bool,
}

/// Output of a successful checkout flow.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessCheckoutOutput {
    /// Store replay summary.
    pub replayed: ReplayCounts,
    /// Branch after the switch, when attached.
    pub branch: Option<String>,
    /// HEAD after the switch.
    pub head_commit: Option<String>,
}

/// Switch Dolt to `reference` and reconcile the store with the new state.
///
/// Refuses to run while the working tree has uncommitted changes; nothing in
/// this flow may destroy local work.
pub async fn process_checkout(
    ctx: &RequestContext,
    deps: &ProcessCheckoutDeps,
    input: ProcessCheckoutInput,
) -> Result<ProcessCheckoutOutput> {
    ctx.ensure_not_cancelled("process_checkout")?;

    if !deps.dolt.is_initialized(ctx).await? {
        return Err(ErrorEnvelope::expected(
            ErrorCode::not_initialized(),
            "no local Dolt repository exists",
        )
        .with_action_required("configure a remote (set_remote) and clone first"));
    }

    if !input.skip_safety_check {
        let check = deps.checker.check(ctx).await?;
        if check.has_local_changes {
            return Err(ErrorEnvelope::expected(
                ErrorCode::conflict(),
                "working tree has uncommitted changes; checkout would lose work",
            )
            .with_action_required("commit local changes, then retry"));
        }
    }

    let pull_deps = as_pull_deps(deps);
    let before = snapshot_documents(ctx, &pull_deps).await?;

    let result = deps
        .dolt
        .checkout(ctx, input.reference.clone(), input.create_branch)
        .await?;
    deps.checker.invalidate().await;
    if !result.success {
        return Err(ErrorEnvelope::unexpected(
            ErrorCode::new("dolt", "command_failed"),
            format!(
                "checkout of {} failed: {}",
                input.reference,
                result.stderr.lines().next().unwrap_or("").trim()
            ),
            ErrorClass::NonRetriable,
        )
        .with_metadata("stderr", result.stderr.trim().to_owned()));
    }

    let after = snapshot_documents(ctx, &pull_deps).await?;
    let replayed = replay_into_store(ctx, &pull_deps, &before, &after).await?;

    let branch = deps.dolt.current_branch(ctx).await?;
    let head_commit = deps.dolt.head_commit_hash(ctx).await?;
    update_manifest_if_changed(deps, head_commit.clone(), branch.clone())?;
    deps.checker.invalidate().await;

    if let Some(logger) = deps.logger.as_ref() {
        let mut fields = LogFields::new();
        fields.insert("reference".into(), input.reference.clone().into());
        fields.insert("added".into(), replayed.added.into());
        fields.insert("updated".into(), replayed.updated.into());
        fields.insert("deleted".into(), replayed.deleted.into());
        logger.info("process_checkout.done", "checkout reconciled", Some(fields));
    }

    Ok(ProcessCheckoutOutput {
        replayed,
        branch,
        head_commit,
    })
}

fn as_pull_deps(deps: &ProcessCheckoutDeps) -> ProcessPullDeps {
    ProcessPullDeps {
        dolt: Arc::clone(&deps.dolt),
        store: Arc::clone(&deps.store),
        manifest: Arc::clone(&deps.manifest),
        checker: Arc::clone(&deps.checker),
        logger: deps.logger.clone(),
    }
}

fn update_manifest_if_changed(
    deps: &ProcessCheckoutDeps,
    commit: Option<String>,
    branch: Option<String>,
) -> Result<()> {
    let Some(current) = deps.manifest.read()? else {
        return Ok(());
    };
    if current.dolt.current_commit == commit && current.dolt.current_branch == branch {
        return Ok(());
    }

    // A checkout onto a detached commit clears the tracked branch.
    let mut updated = current;
    updated.dolt.current_commit = commit;
    updated.dolt.current_branch = branch;
    updated.touch();
    deps.manifest.write(&updated)?;
    Ok(())
}
