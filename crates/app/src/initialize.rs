//! Startup initializer: reconcile the local Dolt working copy with the
//! manifest.
//!
//! Key rule: when no remote is configured and no local repository exists,
//! the initializer never runs `dolt init`. An empty auto-initialized
//! repository would block subsequent clone operations; the system enters
//! `PendingConfiguration` instead, and `set_remote` + clone is the recovery
//! path.

use crate::documents_table::{self, SCHEMA_TABLES};
use crate::process_checkout::{ProcessCheckoutDeps, ProcessCheckoutInput, process_checkout};
use crate::sync_state::SyncStateChecker;
use embranch_domain::{InitMode, Manifest, SyncStateCheck};
use embranch_ports::{DoltPort, LogFields, LoggerPort, ManifestPort, VectorStorePort};
use embranch_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Dependencies for initialization.
#[derive(Clone)]
pub struct InitializeDeps {
    /// Dolt driver.
    pub dolt: Arc<dyn DoltPort>,
    /// Vector store gateway.
    pub store: Arc<dyn VectorStorePort>,
    /// Manifest persistence.
    pub manifest: Arc<dyn ManifestPort>,
    /// Sync-state checker.
    pub checker: Arc<SyncStateChecker>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
}

/// Input for initialization.
#[derive(Debug, Clone, Default)]
pub struct InitializeInput {
    /// Manifest handling enabled at all.
    pub use_manifest: bool,
    /// Startup reconciliation mode.
    pub init_mode: Option<InitMode>,
    /// Seed remote URL from the environment (initial manifest only).
    pub remote_url_seed: Option<String>,
}

/// How startup left the workstation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitStatus {
    /// Local state already matched the manifest.
    InSync,
    /// Local state was checked out to match the manifest.
    Reconciled,
    /// The repository was cloned from the manifest remote.
    Cloned,
    /// No remote configured and no local repository; waiting for
    /// `set_remote` + clone.
    PendingConfiguration,
    /// Local state diverges and automatic reconciliation was not safe or
    /// not permitted; local state left alone.
    OutOfSync,
    /// Manifest handling disabled.
    Disabled,
}

/// Initialization outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct InitializeOutput {
    /// Final status.
    pub status: InitStatus,
    /// Manifest after initialization, when one exists.
    pub manifest: Option<Manifest>,
    /// Sync-state snapshot for diverged workstations.
    pub check: Option<SyncStateCheck>,
}

/// Run the startup decision tree.
pub async fn initialize(
    ctx: &RequestContext,
    deps: &InitializeDeps,
    input: InitializeInput,
) -> Result<InitializeOutput> {
    ctx.ensure_not_cancelled("initialize")?;

    let init_mode = input.init_mode.unwrap_or(InitMode::Auto);
    if !input.use_manifest || init_mode == InitMode::Disabled {
        return Ok(InitializeOutput {
            status: InitStatus::Disabled,
            manifest: None,
            check: None,
        });
    }

    let manifest = match deps.manifest.read()? {
        Some(manifest) => manifest,
        None => {
            if init_mode != InitMode::Auto {
                // Manual mode never fabricates state.
                return Ok(InitializeOutput {
                    status: InitStatus::PendingConfiguration,
                    manifest: None,
                    check: None,
                });
            }
            let created =
                deps.manifest
                    .create_default(input.remote_url_seed.clone(), None, init_mode)?;
            deps.checker.invalidate().await;
            log_event(deps, "initialize.manifest_created", "created default manifest");
            created
        },
    };

    if !deps.dolt.is_initialized(ctx).await? {
        return match manifest.dolt.remote_url.clone() {
            Some(url) => clone_from_manifest(ctx, deps, &manifest, url).await,
            None => Ok(InitializeOutput {
                status: InitStatus::PendingConfiguration,
                manifest: Some(manifest),
                check: None,
            }),
        };
    }

    let check = deps.checker.check(ctx).await?;
    if check.in_sync {
        return Ok(InitializeOutput {
            status: InitStatus::InSync,
            manifest: Some(manifest),
            check: Some(check),
        });
    }

    if check.safe_to_sync() && init_mode == InitMode::Auto {
        let target = manifest.checkout_target().to_owned();
        process_checkout(
            ctx,
            &checkout_deps(deps),
            ProcessCheckoutInput {
                reference: target,
                create_branch: false,
                skip_safety_check: true,
            },
        )
        .await?;
        let manifest = deps.manifest.read()?;
        return Ok(InitializeOutput {
            status: InitStatus::Reconciled,
            manifest,
            check: None,
        });
    }

    // Not safe (or manual mode): leave local state alone and report.
    Ok(InitializeOutput {
        status: InitStatus::OutOfSync,
        manifest: Some(manifest),
        check: Some(check),
    })
}

/// Clone the manifest remote onto a fresh workstation.
async fn clone_from_manifest(
    ctx: &RequestContext,
    deps: &InitializeDeps,
    manifest: &Manifest,
    url: String,
) -> Result<InitializeOutput> {
    let branch = manifest
        .dolt
        .current_branch
        .clone()
        .or_else(|| Some(manifest.dolt.default_branch.clone()));

    let result = deps.dolt.clone_repository(ctx, url, branch).await?;
    deps.checker.invalidate().await;
    if !result.success {
        return Err(ErrorEnvelope::unexpected(
            ErrorCode::new("dolt", "command_failed"),
            format!(
                "clone failed: {}",
                result.stderr.lines().next().unwrap_or("").trim()
            ),
            embranch_shared::ErrorClass::NonRetriable,
        )
        .with_metadata("stderr", result.stderr.trim().to_owned())
        .with_action_required("verify the remote URL and credentials, then retry"));
    }

    if let Some(commit) = manifest.dolt.current_commit.clone() {
        process_checkout(
            ctx,
            &checkout_deps(deps),
            ProcessCheckoutInput {
                reference: commit,
                create_branch: false,
                skip_safety_check: true,
            },
        )
        .await?;
    }

    // Populate the manifest from the cloned HEAD.
    let head = deps.dolt.head_commit_hash(ctx).await?;
    let branch = deps.dolt.current_branch(ctx).await?;
    let updated = deps.manifest.update_dolt_state(head, branch)?;
    deps.checker.invalidate().await;

    log_event(deps, "initialize.cloned", "cloned repository from manifest remote");
    Ok(InitializeOutput {
        status: InitStatus::Cloned,
        manifest: Some(updated),
        check: None,
    })
}

/// Emptiness heuristic gating destructive clone recovery.
///
/// A repository is "empty" iff all of: at most two commits in the log (a
/// fresh Dolt repository carries up to two bookkeeping commits), no
/// `documents` rows, and no non-schema user tables. Only such a repository
/// may have its `.dolt` directory removed for a clone.
pub async fn is_repository_empty(ctx: &RequestContext, dolt: &Arc<dyn DoltPort>) -> Result<bool> {
    let log = dolt.log(ctx, 3).await?;
    if log.len() > 2 {
        return Ok(false);
    }

    let tables = documents_table::list_tables(ctx, dolt).await?;
    let has_user_tables = tables
        .iter()
        .any(|table| !SCHEMA_TABLES.contains(&table.as_str()));
    if has_user_tables {
        return Ok(false);
    }

    if tables.iter().any(|table| table == "documents") {
        let rows = dolt
            .query(ctx, "SELECT COUNT(*) AS n FROM documents".to_owned())
            .await?;
        let count = rows
            .first()
            .and_then(|row| row.get("n"))
            .and_then(|value| {
                value
                    .as_i64()
                    .or_else(|| value.as_str().and_then(|text| text.parse().ok()))
            })
            .unwrap_or(0);
        if count > 0 {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Input for explicit clone (the `PendingConfiguration` recovery path).
#[derive(Debug, Clone)]
pub struct ProcessCloneInput {
    /// Remote URL to clone.
    pub url: String,
    /// Replace an existing (empty) repository.
    pub force: bool,
}

/// Clone a remote into the repository root, guarding existing state.
pub async fn process_clone(
    ctx: &RequestContext,
    deps: &InitializeDeps,
    input: ProcessCloneInput,
) -> Result<InitializeOutput> {
    ctx.ensure_not_cancelled("process_clone")?;

    if deps.dolt.is_initialized(ctx).await? {
        if !input.force {
            return Err(ErrorEnvelope::expected(
                ErrorCode::already_initialized(),
                "a local Dolt repository already exists",
            )
            .with_action_required("pass force=true to replace an empty repository"));
        }
        if !is_repository_empty(ctx, &deps.dolt).await? {
            return Err(ErrorEnvelope::expected(
                ErrorCode::conflict(),
                "refusing to remove a repository with commits or user data",
            )
            .with_action_required("push or back up local data before forcing a clone"));
        }
        let dolt_dir = deps.dolt.repo_root().join(".dolt");
        match tokio::fs::remove_dir_all(&dolt_dir).await {
            Ok(()) => {},
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {},
            Err(error) => return Err(error.into()),
        }
    }

    let result = deps
        .dolt
        .clone_repository(ctx, input.url.clone(), None)
        .await?;
    deps.checker.invalidate().await;
    if !result.success {
        return Err(ErrorEnvelope::unexpected(
            ErrorCode::new("dolt", "command_failed"),
            format!(
                "clone failed: {}",
                result.stderr.lines().next().unwrap_or("").trim()
            ),
            embranch_shared::ErrorClass::NonRetriable,
        )
        .with_metadata("stderr", result.stderr.trim().to_owned()));
    }

    if deps.manifest.exists() {
        deps.manifest.set_remote(input.url.clone())?;
    } else {
        deps.manifest
            .create_default(Some(input.url.clone()), None, InitMode::Auto)?;
    }
    let head = deps.dolt.head_commit_hash(ctx).await?;
    let branch = deps.dolt.current_branch(ctx).await?;
    let manifest = deps.manifest.update_dolt_state(head, branch)?;
    deps.checker.invalidate().await;

    Ok(InitializeOutput {
        status: InitStatus::Cloned,
        manifest: Some(manifest),
        check: None,
    })
}

fn checkout_deps(deps: &InitializeDeps) -> ProcessCheckoutDeps {
    ProcessCheckoutDeps {
        dolt: Arc::clone(&deps.dolt),
        store: Arc::clone(&deps.store),
        manifest: Arc::clone(&deps.manifest),
        checker: Arc::clone(&deps.checker),
        logger: deps.logger.clone(),
    }
}

fn log_event(deps: &InitializeDeps, event: &str, message: &str) {
    if let Some(logger) = deps.logger.as_ref() {
        logger.info(event, message, None::<LogFields>);
    }
}
