//! Version-control tools: push, pull, checkout, clone, remotes, status.

use crate::wrap::{attach_warning, respond};
use embranch_api::v1::{
    CheckoutRequest, CloneRequest, PullRequest, PushRequest, PushSummaryDto, ReplaySummaryDto,
    SetRemoteRequest, SyncStatusDto, ToolResponse,
};
use embranch_app::{
    ProcessCheckoutInput, ProcessCloneInput, ProcessPullInput, ProcessPushInput, process_checkout,
    process_clone, process_pull, process_push,
};
use embranch_infra::ServerState;
use embranch_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};

/// Flush local changes and push them to the remote (mutating).
pub async fn push(
    state: &ServerState,
    ctx: &RequestContext,
    request: PushRequest,
) -> ToolResponse {
    let result: Result<PushSummaryDto> = async {
        let _guard = state.lock_writes().await;
        let remote = request
            .remote
            .unwrap_or_else(|| state.config.dolt.remote_name.clone());
        let branch = resolve_branch(state, ctx, request.branch).await?;
        let output = process_push(
            ctx,
            &state.push_deps(),
            ProcessPushInput { remote, branch },
        )
        .await?;
        Ok(PushSummaryDto {
            outcome: serde_json::to_value(&output.report.outcome)
                .unwrap_or(serde_json::Value::Null),
            commits_pushed: output.report.commits_pushed,
            flushed: output.flushed.len(),
            head_commit: output.head_commit,
            message: output.report.message,
        })
    }
    .await;
    attach_warning(state, ctx, respond(result)).await
}

/// Pull remote changes and replay them into the store (mutating).
pub async fn pull(
    state: &ServerState,
    ctx: &RequestContext,
    request: PullRequest,
) -> ToolResponse {
    let result: Result<ReplaySummaryDto> = async {
        let _guard = state.lock_writes().await;
        let remote = request
            .remote
            .unwrap_or_else(|| state.config.dolt.remote_name.clone());
        let branch = resolve_branch(state, ctx, request.branch).await?;
        let output = process_pull(
            ctx,
            &state.pull_deps(),
            ProcessPullInput { remote, branch },
        )
        .await?;
        Ok(ReplaySummaryDto {
            added: output.replayed.added,
            updated: output.replayed.updated,
            deleted: output.replayed.deleted,
            head_commit: output.head_commit,
        })
    }
    .await;
    attach_warning(state, ctx, respond(result)).await
}

/// Switch refs and reconcile the store (mutating).
pub async fn checkout(
    state: &ServerState,
    ctx: &RequestContext,
    request: CheckoutRequest,
) -> ToolResponse {
    let result: Result<ReplaySummaryDto> = async {
        let _guard = state.lock_writes().await;
        let output = process_checkout(
            ctx,
            &state.checkout_deps(),
            ProcessCheckoutInput {
                reference: request.reference,
                create_branch: request.create_branch,
                skip_safety_check: false,
            },
        )
        .await?;
        Ok(ReplaySummaryDto {
            added: output.replayed.added,
            updated: output.replayed.updated,
            deleted: output.replayed.deleted,
            head_commit: output.head_commit,
        })
    }
    .await;
    attach_warning(state, ctx, respond(result)).await
}

/// Set the canonical remote URL on manifest and repository (mutating).
pub async fn set_remote(
    state: &ServerState,
    ctx: &RequestContext,
    request: SetRemoteRequest,
) -> ToolResponse {
    let result: Result<serde_json::Value> = async {
        let _guard = state.lock_writes().await;
        if state.manifest.exists() {
            state.manifest.set_remote(request.url.clone())?;
        } else {
            state.manifest.create_default(
                Some(request.url.clone()),
                None,
                state.config.manifest.init_mode,
            )?;
        }
        state.checker.invalidate().await;

        if state.dolt.is_initialized(ctx).await? {
            state
                .dolt
                .set_remote(
                    ctx,
                    state.config.dolt.remote_name.clone(),
                    request.url.clone(),
                )
                .await?;
        }
        Ok(serde_json::json!({"remote_url": request.url}))
    }
    .await;
    attach_warning(state, ctx, respond(result)).await
}

/// Clone a remote repository (mutating; the PendingConfiguration recovery
/// path).
pub async fn clone_repository(
    state: &ServerState,
    ctx: &RequestContext,
    request: CloneRequest,
) -> ToolResponse {
    let result: Result<serde_json::Value> = async {
        let _guard = state.lock_writes().await;
        let url = match request.url {
            Some(url) => url,
            None => state
                .manifest
                .read()?
                .and_then(|manifest| manifest.dolt.remote_url)
                .ok_or_else(|| {
                    ErrorEnvelope::expected(
                        ErrorCode::invalid_input(),
                        "no remote URL given and none configured in the manifest",
                    )
                    .with_action_required("call set_remote first or pass a URL")
                })?,
        };
        let output = process_clone(
            ctx,
            &state.initialize_deps(),
            ProcessCloneInput {
                url,
                force: request.force,
            },
        )
        .await?;
        Ok(serde_json::json!({
            "status": serde_json::to_value(output.status).unwrap_or(serde_json::Value::Null),
            "head_commit": output
                .manifest
                .as_ref()
                .and_then(|manifest| manifest.dolt.current_commit.clone()),
        }))
    }
    .await;
    attach_warning(state, ctx, respond(result)).await
}

/// Full sync-state report (read-only; never warned).
pub async fn sync_status(state: &ServerState, ctx: &RequestContext) -> ToolResponse {
    let result: Result<SyncStatusDto> = async {
        let _guard = state.lock_reads().await;
        let check = state.checker.check(ctx).await?;
        Ok(SyncStatusDto {
            check,
            manifest_path: state.manifest.path().display().to_string(),
        })
    }
    .await;
    respond(result)
}

/// Repository status: availability, branch, head, remotes (read-only).
pub async fn repository_status(state: &ServerState, ctx: &RequestContext) -> ToolResponse {
    let result: Result<serde_json::Value> = async {
        let _guard = state.lock_reads().await;
        let available = state.dolt.check_available(ctx).await?;
        if !available {
            return Ok(serde_json::json!({
                "dolt_available": false,
                "initialized": false,
            }));
        }
        let initialized = state.dolt.is_initialized(ctx).await?;
        if !initialized {
            return Ok(serde_json::json!({
                "dolt_available": true,
                "initialized": false,
            }));
        }
        let status = state.dolt.status(ctx).await?;
        let head = state.dolt.head_commit_hash(ctx).await?;
        let remotes = state.dolt.list_remotes(ctx).await?;
        Ok(serde_json::json!({
            "dolt_available": true,
            "initialized": true,
            "branch": status.branch,
            "detached_head": status.detached_head,
            "has_changes": status.has_changes,
            "head_commit": head,
            "remotes": remotes,
        }))
    }
    .await;
    respond(result)
}

/// Commit history (read-only).
pub async fn history(state: &ServerState, ctx: &RequestContext, limit: u32) -> ToolResponse {
    let result: Result<serde_json::Value> = async {
        let _guard = state.lock_reads().await;
        let entries = state.dolt.log(ctx, limit.clamp(1, 500)).await?;
        Ok(serde_json::json!({"commits": entries}))
    }
    .await;
    respond(result)
}

async fn resolve_branch(
    state: &ServerState,
    ctx: &RequestContext,
    requested: Option<String>,
) -> Result<String> {
    if let Some(branch) = requested {
        return Ok(branch);
    }
    if let Some(branch) = state.dolt.current_branch(ctx).await? {
        return Ok(branch);
    }
    if let Some(manifest) = state.manifest.read()? {
        return Ok(manifest.dolt.default_branch);
    }
    Err(
        ErrorEnvelope::expected(ErrorCode::invalid_input(), "no branch given or detectable")
            .with_action_required("pass a branch name explicitly"),
    )
}
