//! Dolt CLI boundary contract.
//!
//! The driver spawns the external `dolt` executable and reports raw
//! results. It never interprets failures: push output classification
//! belongs to the pure analyzer, everything else to the calling use-case.

use crate::BoxFuture;
use embranch_shared::{RequestContext, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Uniform result of one external `dolt` invocation.
///
/// `success` mirrors the exit status; a non-zero exit is data, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoltCommandResult {
    /// True when the process exited with status zero.
    pub success: bool,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Exit code, when the process terminated normally.
    pub exit_code: Option<i32>,
}

/// Parsed `dolt status` summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoltStatus {
    /// True when the working tree has staged or unstaged changes.
    pub has_changes: bool,
    /// True when HEAD is detached.
    pub detached_head: bool,
    /// Current branch, when attached.
    pub branch: Option<String>,
}

/// A configured remote, deduplicated across fetch/push entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoltRemote {
    /// Remote name (e.g. `origin`).
    pub name: String,
    /// Remote URL with directional annotations stripped.
    pub url: String,
}

/// One entry of `dolt log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoltLogEntry {
    /// Commit hash.
    pub hash: String,
    /// Author line, when present.
    pub author: Option<String>,
    /// Commit message (first line).
    pub message: String,
}

/// Reset behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetMode {
    /// Keep working tree, move HEAD.
    Soft,
    /// Discard working tree and move HEAD.
    Hard,
}

/// A row returned from `dolt sql` in JSON mode.
pub type DoltRow = BTreeMap<String, Value>;

/// Boundary contract for driving the Dolt CLI.
///
/// Read operations (`status`, `log`, `current_branch`, `head_commit_hash`,
/// `list_remotes`, `query`) may run concurrently; write-path operations are
/// serialized by the caller.
pub trait DoltPort: Send + Sync {
    /// Repository root this driver operates on.
    fn repo_root(&self) -> &std::path::Path;

    /// True when the `dolt` executable can be spawned at all.
    fn check_available(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<bool>>;

    /// True when the repository root contains an initialized Dolt repo.
    fn is_initialized(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<bool>>;

    /// Initialize a fresh repository (`dolt init`).
    fn init(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<()>>;

    /// Clone `url` into the repository root, optionally checking out a
    /// branch and pinning a commit afterwards.
    fn clone_repository(
        &self,
        ctx: &RequestContext,
        url: String,
        branch: Option<String>,
    ) -> BoxFuture<'_, Result<DoltCommandResult>>;

    /// Check out a ref, optionally creating it as a branch.
    fn checkout(
        &self,
        ctx: &RequestContext,
        reference: String,
        create_branch: bool,
    ) -> BoxFuture<'_, Result<DoltCommandResult>>;

    /// Stage all changes (`dolt add -A`).
    fn add_all(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<()>>;

    /// Create a commit with the given message.
    fn commit(&self, ctx: &RequestContext, message: String) -> BoxFuture<'_, Result<()>>;

    /// Parse `dolt status`.
    fn status(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<DoltStatus>>;

    /// Read up to `limit` log entries for HEAD.
    fn log(&self, ctx: &RequestContext, limit: u32) -> BoxFuture<'_, Result<Vec<DoltLogEntry>>>;

    /// Current branch; `None` on detached HEAD.
    fn current_branch(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<Option<String>>>;

    /// HEAD commit hash; `None` when the repository has no commits.
    fn head_commit_hash(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<Option<String>>>;

    /// Configured remotes, deduplicated by name.
    fn list_remotes(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<Vec<DoltRemote>>>;

    /// Add or replace a remote.
    fn set_remote(
        &self,
        ctx: &RequestContext,
        name: String,
        url: String,
    ) -> BoxFuture<'_, Result<()>>;

    /// Pull `branch` from `remote`; merge output is data for the caller.
    fn pull(
        &self,
        ctx: &RequestContext,
        remote: String,
        branch: String,
    ) -> BoxFuture<'_, Result<DoltCommandResult>>;

    /// Push `branch` to `remote`; output is classified by the analyzer.
    fn push(
        &self,
        ctx: &RequestContext,
        remote: String,
        branch: String,
        force: bool,
    ) -> BoxFuture<'_, Result<DoltCommandResult>>;

    /// Fetch from `remote`.
    fn fetch(
        &self,
        ctx: &RequestContext,
        remote: String,
    ) -> BoxFuture<'_, Result<DoltCommandResult>>;

    /// Merge `reference` into the current branch.
    fn merge(
        &self,
        ctx: &RequestContext,
        reference: String,
    ) -> BoxFuture<'_, Result<DoltCommandResult>>;

    /// Best common ancestor of two refs; `None` when unrelated.
    fn merge_base(
        &self,
        ctx: &RequestContext,
        left: String,
        right: String,
    ) -> BoxFuture<'_, Result<Option<String>>>;

    /// Reset HEAD to `reference`.
    fn reset(
        &self,
        ctx: &RequestContext,
        reference: String,
        mode: ResetMode,
    ) -> BoxFuture<'_, Result<DoltCommandResult>>;

    /// Run a read-only SQL query and return rows.
    ///
    /// The SQL text is passed through verbatim; callers are responsible for
    /// escaping embedded values.
    fn query(&self, ctx: &RequestContext, sql: String) -> BoxFuture<'_, Result<Vec<DoltRow>>>;

    /// Run a mutating SQL statement.
    fn execute(&self, ctx: &RequestContext, sql: String) -> BoxFuture<'_, Result<()>>;
}
