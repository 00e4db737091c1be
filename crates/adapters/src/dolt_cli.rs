//! Dolt process driver.
//!
//! Spawns the external `dolt` executable with the repository root as the
//! working directory, captures stdout/stderr/exit status, and parses the
//! line-oriented commands the core reads (`remote -v`, `status`, `log`).
//! The driver surfaces failures as data and never classifies them.

use embranch_ports::{
    BoxFuture, DoltCommandResult, DoltLogEntry, DoltPort, DoltRemote, DoltRow, DoltStatus,
    ResetMode,
};
use embranch_shared::{
    ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result, timeout_with_context,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Dolt CLI driver bound to one repository root.
#[derive(Debug, Clone)]
pub struct DoltCli {
    executable: PathBuf,
    repo_root: PathBuf,
    timeout: Duration,
}

impl DoltCli {
    /// Create a driver for `repo_root` using the given executable and
    /// per-invocation timeout.
    #[must_use]
    pub fn new(executable: PathBuf, repo_root: PathBuf, timeout: Duration) -> Self {
        Self {
            executable,
            repo_root,
            timeout,
        }
    }

    /// Spawn `dolt` with `args`, working directory `cwd`.
    async fn run_in(
        &self,
        ctx: &RequestContext,
        cwd: &Path,
        args: &[&str],
    ) -> Result<DoltCommandResult> {
        let mut command = Command::new(&self.executable);
        command
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let operation = "dolt.run";
        let output = timeout_with_context(ctx, self.timeout, operation, async {
            command.output().await.map_err(|error| {
                ErrorEnvelope::unexpected(
                    ErrorCode::new("dolt", "spawn_failed"),
                    format!("failed to spawn dolt: {error}"),
                    ErrorClass::NonRetriable,
                )
                .with_metadata("executable", self.executable.display().to_string())
            })
        })
        .await?;

        Ok(DoltCommandResult {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }

    async fn run(&self, ctx: &RequestContext, args: &[&str]) -> Result<DoltCommandResult> {
        self.run_in(ctx, &self.repo_root, args).await
    }

    /// Run and convert a non-zero exit into an uninterpreted failure.
    async fn run_expecting_success(&self, ctx: &RequestContext, args: &[&str]) -> Result<()> {
        let result = self.run(ctx, args).await?;
        if result.success {
            Ok(())
        } else {
            Err(command_failed(args, &result))
        }
    }
}

/// Build an uninterpreted command failure carrying the raw streams.
fn command_failed(args: &[&str], result: &DoltCommandResult) -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::new("dolt", "command_failed"),
        format!(
            "dolt {} exited with status {}",
            args.first().copied().unwrap_or(""),
            result
                .exit_code
                .map_or_else(|| "unknown".to_owned(), |code| code.to_string()),
        ),
        ErrorClass::NonRetriable,
    )
    .with_metadata("stderr", result.stderr.trim().to_owned())
    .with_metadata("stdout", result.stdout.trim().to_owned())
}

/// Parse `dolt remote -v` output into deduplicated remotes.
///
/// Columns are split on any whitespace run (observed Dolt builds emit
/// space-aligned columns, not tabs). Malformed lines are skipped; fetch and
/// push entries for the same name collapse into one entry.
#[must_use]
pub fn parse_remotes(output: &str) -> Vec<DoltRemote> {
    let mut by_name: BTreeMap<String, String> = BTreeMap::new();
    let mut order: Vec<String> = Vec::new();

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(name) = parts.next() else { continue };
        let Some(url) = parts.next() else { continue };
        let url = url
            .trim_end_matches("(fetch)")
            .trim_end_matches("(push)")
            .trim();
        if url.is_empty() {
            continue;
        }
        if !by_name.contains_key(name) {
            order.push(name.to_owned());
        }
        by_name.insert(name.to_owned(), url.to_owned());
    }

    order
        .into_iter()
        .filter_map(|name| {
            by_name.get(&name).map(|url| DoltRemote {
                name: name.clone(),
                url: url.clone(),
            })
        })
        .collect()
}

/// Parse `dolt status` output.
#[must_use]
pub fn parse_status(output: &str) -> DoltStatus {
    let mut branch = None;
    let mut detached = false;

    for line in output.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("On branch ") {
            branch = Some(rest.trim().to_owned());
        } else if trimmed.starts_with("HEAD detached") {
            detached = true;
        }
    }

    let lowered = output.to_ascii_lowercase();
    let clean = lowered.contains("working tree clean") || lowered.contains("nothing to commit");

    DoltStatus {
        has_changes: !clean,
        detached_head: detached,
        branch: if detached { None } else { branch },
    }
}

/// Parse `dolt log` output into entries.
#[must_use]
pub fn parse_log(output: &str) -> Vec<DoltLogEntry> {
    let mut entries = Vec::new();
    let mut current: Option<DoltLogEntry> = None;

    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("commit ") {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            let hash = rest.split_whitespace().next().unwrap_or("").to_owned();
            current = Some(DoltLogEntry {
                hash,
                author: None,
                message: String::new(),
            });
        } else if let Some(entry) = current.as_mut() {
            if let Some(author) = line.strip_prefix("Author:") {
                entry.author = Some(author.trim().to_owned());
            } else if !line.starts_with("Date:") {
                let text = line.trim();
                if !text.is_empty() && entry.message.is_empty() {
                    entry.message = text.to_owned();
                }
            }
        }
    }

    if let Some(entry) = current.take() {
        entries.push(entry);
    }
    entries
}

fn parse_query_rows(stdout: &str) -> Result<Vec<DoltRow>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(trimmed).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::new("dolt", "query_parse_failed"),
            format!("failed to parse dolt sql JSON output: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;

    let rows = value
        .get("rows")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Ok(rows
        .into_iter()
        .filter_map(|row| match row {
            Value::Object(map) => Some(map.into_iter().collect::<DoltRow>()),
            _ => None,
        })
        .collect())
}

impl DoltPort for DoltCli {
    fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    fn check_available(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<bool>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            // Spawn failure means "not available", not an error.
            match self.run_in(&ctx, Path::new("."), &["version"]).await {
                Ok(result) => Ok(result.success),
                Err(_) => Ok(false),
            }
        })
    }

    fn is_initialized(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<bool>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("dolt.is_initialized")?;
            Ok(self.repo_root.join(".dolt").is_dir())
        })
    }

    fn init(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            tokio::fs::create_dir_all(&self.repo_root).await?;
            self.run_expecting_success(&ctx, &["init"]).await
        })
    }

    fn clone_repository(
        &self,
        ctx: &RequestContext,
        url: String,
        branch: Option<String>,
    ) -> BoxFuture<'_, Result<DoltCommandResult>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let parent = self
                .repo_root
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            tokio::fs::create_dir_all(&parent).await?;

            let target = self
                .repo_root
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| ".".to_owned());

            let mut args = vec!["clone"];
            if let Some(branch) = branch.as_deref() {
                args.push("-b");
                args.push(branch);
            }
            args.push(&url);
            args.push(&target);

            self.run_in(&ctx, &parent, &args).await
        })
    }

    fn checkout(
        &self,
        ctx: &RequestContext,
        reference: String,
        create_branch: bool,
    ) -> BoxFuture<'_, Result<DoltCommandResult>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let mut args = vec!["checkout"];
            if create_branch {
                args.push("-b");
            }
            args.push(&reference);
            self.run(&ctx, &args).await
        })
    }

    fn add_all(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move { self.run_expecting_success(&ctx, &["add", "-A"]).await })
    }

    fn commit(&self, ctx: &RequestContext, message: String) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            self.run_expecting_success(&ctx, &["commit", "-m", message.as_str()])
                .await
        })
    }

    fn status(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<DoltStatus>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let result = self.run(&ctx, &["status"]).await?;
            if !result.success {
                return Err(command_failed(&["status"], &result));
            }
            Ok(parse_status(&result.stdout))
        })
    }

    fn log(&self, ctx: &RequestContext, limit: u32) -> BoxFuture<'_, Result<Vec<DoltLogEntry>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let limit_text = limit.to_string();
            let result = self.run(&ctx, &["log", "-n", limit_text.as_str()]).await?;
            if !result.success {
                // A repository without commits has no log; that is data.
                return Ok(Vec::new());
            }
            Ok(parse_log(&result.stdout))
        })
    }

    fn current_branch(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<Option<String>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let result = self.run(&ctx, &["status"]).await?;
            if !result.success {
                return Err(command_failed(&["status"], &result));
            }
            Ok(parse_status(&result.stdout).branch)
        })
    }

    fn head_commit_hash(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<Option<String>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let result = self.run(&ctx, &["log", "-n", "1"]).await?;
            if !result.success {
                return Ok(None);
            }
            Ok(parse_log(&result.stdout)
                .into_iter()
                .next()
                .map(|entry| entry.hash))
        })
    }

    fn list_remotes(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<Vec<DoltRemote>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let result = self.run(&ctx, &["remote", "-v"]).await?;
            if !result.success {
                return Err(command_failed(&["remote"], &result));
            }
            Ok(parse_remotes(&result.stdout))
        })
    }

    fn set_remote(
        &self,
        ctx: &RequestContext,
        name: String,
        url: String,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let existing = self.list_remotes(&ctx).await?;
            if existing.iter().any(|remote| remote.name == name) {
                self.run_expecting_success(&ctx, &["remote", "remove", name.as_str()])
                    .await?;
            }
            self.run_expecting_success(&ctx, &["remote", "add", name.as_str(), url.as_str()])
                .await
        })
    }

    fn pull(
        &self,
        ctx: &RequestContext,
        remote: String,
        branch: String,
    ) -> BoxFuture<'_, Result<DoltCommandResult>> {
        let ctx = ctx.clone();
        Box::pin(async move { self.run(&ctx, &["pull", remote.as_str(), branch.as_str()]).await })
    }

    fn push(
        &self,
        ctx: &RequestContext,
        remote: String,
        branch: String,
        force: bool,
    ) -> BoxFuture<'_, Result<DoltCommandResult>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let mut args = vec!["push"];
            if force {
                args.push("--force");
            }
            args.push(&remote);
            args.push(&branch);
            self.run(&ctx, &args).await
        })
    }

    fn fetch(
        &self,
        ctx: &RequestContext,
        remote: String,
    ) -> BoxFuture<'_, Result<DoltCommandResult>> {
        let ctx = ctx.clone();
        Box::pin(async move { self.run(&ctx, &["fetch", remote.as_str()]).await })
    }

    fn merge(
        &self,
        ctx: &RequestContext,
        reference: String,
    ) -> BoxFuture<'_, Result<DoltCommandResult>> {
        let ctx = ctx.clone();
        Box::pin(async move { self.run(&ctx, &["merge", reference.as_str()]).await })
    }

    fn merge_base(
        &self,
        ctx: &RequestContext,
        left: String,
        right: String,
    ) -> BoxFuture<'_, Result<Option<String>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let result = self.run(&ctx, &["merge-base", left.as_str(), right.as_str()]).await?;
            if !result.success {
                return Ok(None);
            }
            let base = result.stdout.trim();
            Ok(if base.is_empty() {
                None
            } else {
                Some(base.to_owned())
            })
        })
    }

    fn reset(
        &self,
        ctx: &RequestContext,
        reference: String,
        mode: ResetMode,
    ) -> BoxFuture<'_, Result<DoltCommandResult>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let flag = match mode {
                ResetMode::Soft => "--soft",
                ResetMode::Hard => "--hard",
            };
            self.run(&ctx, &["reset", flag, reference.as_str()]).await
        })
    }

    fn query(&self, ctx: &RequestContext, sql: String) -> BoxFuture<'_, Result<Vec<DoltRow>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let result = self
                .run(&ctx, &["sql", "--query", sql.as_str(), "--result-format", "json"])
                .await?;
            if !result.success {
                return Err(command_failed(&["sql"], &result));
            }
            parse_query_rows(&result.stdout)
        })
    }

    fn execute(&self, ctx: &RequestContext, sql: String) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            self.run_expecting_success(&ctx, &["sql", "--query", sql.as_str()])
                .await
        })
    }
}
