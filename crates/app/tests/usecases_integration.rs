//! Integration tests for the app use-cases against a scriptable in-memory
//! Dolt driver, the real embedded store, and the real manifest store.

use embranch_adapters::{HashEmbedding, LocalStore, ManifestStore, spawn_store_worker};
use embranch_app::{
    ChangeDetectorDeps, InitStatus, InitializeDeps, InitializeInput, ProcessCheckoutDeps,
    ProcessCheckoutInput, ProcessCloneInput, ProcessPullDeps, ProcessPullInput, ProcessPushDeps,
    ProcessPushInput, SyncStateChecker, detect_changes, initialize, is_repository_empty,
    process_checkout, process_clone, process_pull, process_push,
};
use embranch_domain::{CollectionName, DocumentId, InitMode, SyncStateReason};
use embranch_ports::{
    BoxFuture, DocumentInput, DoltCommandResult, DoltLogEntry, DoltPort, DoltRemote, DoltRow,
    DoltStatus, ManifestPort, ResetMode, VectorStorePort,
};
use embranch_shared::{ErrorCode, RequestContext, Result};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ─────────────────────────────────────────────────────────────────────────────
// Fake Dolt driver
// ─────────────────────────────────────────────────────────────────────────────

type DocKey = (String, String);

#[derive(Debug, Clone, Default)]
struct FakeDoltState {
    initialized: bool,
    branch: Option<String>,
    head: Option<String>,
    has_changes: bool,
    tables: BTreeSet<String>,
    documents: BTreeMap<DocKey, (String, Option<String>)>,
    sync_logged: BTreeSet<String>,
    executed: Vec<String>,
    commit_hashes: VecDeque<String>,
    push_results: VecDeque<DoltCommandResult>,
    pull_result: Option<DoltCommandResult>,
    post_pull: Option<PostPull>,
    checkout_script: BTreeMap<String, CheckoutTarget>,
    ancestors: BTreeSet<(String, String)>,
    remotes: Vec<DoltRemote>,
    log_len: usize,
}

#[derive(Debug, Clone)]
struct PostPull {
    head: String,
    documents: BTreeMap<DocKey, (String, Option<String>)>,
}

#[derive(Debug, Clone)]
struct CheckoutTarget {
    branch: Option<String>,
    head: String,
    documents: Option<BTreeMap<DocKey, (String, Option<String>)>>,
}

struct FakeDolt {
    root: PathBuf,
    state: Arc<Mutex<FakeDoltState>>,
}

impl FakeDolt {
    fn new(tag: &str) -> Self {
        let root = std::env::temp_dir().join(format!(
            "embranch-fakedolt-{tag}-{}",
            std::process::id()
        ));
        Self {
            root,
            state: Arc::new(Mutex::new(FakeDoltState {
                log_len: 1,
                ..FakeDoltState::default()
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeDoltState> {
        self.state.lock().expect("fake dolt state")
    }

    fn with_schema(self) -> Self {
        {
            let mut state = self.lock();
            state.initialized = true;
            state.tables.insert("documents".to_owned());
            state.tables.insert("sync_log".to_owned());
            state.branch = Some("main".to_owned());
            state.head = Some("abcd123".to_owned());
        }
        self
    }

    fn ok(stdout: &str) -> DoltCommandResult {
        DoltCommandResult {
            success: true,
            stdout: stdout.to_owned(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    fn fail(stderr: &str) -> DoltCommandResult {
        DoltCommandResult {
            success: false,
            stdout: String::new(),
            stderr: stderr.to_owned(),
            exit_code: Some(1),
        }
    }

    fn apply_documents_statement(state: &mut FakeDoltState, sql: &str) {
        if let Some(rest) = sql.strip_prefix("INSERT INTO documents ") {
            if let Some(values) = rest.split("VALUES (").nth(1) {
                let fields = parse_quoted_fields(values);
                if fields.len() >= 3 {
                    let metadata = fields.get(3).cloned();
                    state.documents.insert(
                        (fields.get(1).cloned().unwrap_or_default(), fields.first().cloned().unwrap_or_default()),
                        (fields.get(2).cloned().unwrap_or_default(), metadata),
                    );
                    state.has_changes = true;
                }
            }
        } else if sql.starts_with("DELETE FROM documents ") {
            let collection = between(sql, "collection = '", "'");
            let id = between(sql, "id = '", "'");
            if let (Some(collection), Some(id)) = (collection, id) {
                state.documents.remove(&(collection, id));
                state.has_changes = true;
            }
        } else if sql.starts_with("INSERT INTO sync_log ") {
            if let Some(collection) = between(sql, "VALUES ('", "'") {
                state.sync_logged.insert(collection);
                state.has_changes = true;
            }
        } else if sql.starts_with("CREATE TABLE IF NOT EXISTS documents") {
            state.tables.insert("documents".to_owned());
        } else if sql.starts_with("CREATE TABLE IF NOT EXISTS sync_log") {
            state.tables.insert("sync_log".to_owned());
        }
    }
}

/// Extract `'quoted'` fields from a VALUES fragment with plain test data.
fn parse_quoted_fields(fragment: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut rest = fragment;
    while let Some(start) = rest.find('\'') {
        let Some(after) = rest.get(start + 1..) else { break };
        let Some(end) = after.find('\'') else { break };
        fields.push(after.get(..end).unwrap_or_default().to_owned());
        rest = after.get(end + 1..).unwrap_or_default();
        if rest.trim_start().starts_with(", NOW()") {
            break;
        }
    }
    fields
}

fn between(text: &str, prefix: &str, suffix: &str) -> Option<String> {
    let start = text.find(prefix)? + prefix.len();
    let rest = text.get(start..)?;
    let end = rest.find(suffix)?;
    rest.get(..end).map(str::to_owned)
}

impl DoltPort for FakeDolt {
    fn repo_root(&self) -> &Path {
        &self.root
    }

    fn check_available(&self, _ctx: &RequestContext) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async { Ok(true) })
    }

    fn is_initialized(&self, _ctx: &RequestContext) -> BoxFuture<'_, Result<bool>> {
        let initialized = self.lock().initialized;
        Box::pin(async move { Ok(initialized) })
    }

    fn init(&self, _ctx: &RequestContext) -> BoxFuture<'_, Result<()>> {
        self.lock().initialized = true;
        Box::pin(async { Ok(()) })
    }

    fn clone_repository(
        &self,
        _ctx: &RequestContext,
        _url: String,
        branch: Option<String>,
    ) -> BoxFuture<'_, Result<DoltCommandResult>> {
        {
            let mut state = self.lock();
            state.initialized = true;
            state.branch = branch.or_else(|| Some("main".to_owned()));
            state.head = Some("clonedhead1".to_owned());
            state.tables.insert("documents".to_owned());
            state.tables.insert("sync_log".to_owned());
            state.executed.push("clone".to_owned());
        }
        Box::pin(async { Ok(Self::ok("")) })
    }

    fn checkout(
        &self,
        _ctx: &RequestContext,
        reference: String,
        _create_branch: bool,
    ) -> BoxFuture<'_, Result<DoltCommandResult>> {
        let result = {
            let mut state = self.lock();
            state.executed.push(format!("checkout {reference}"));
            if let Some(target) = state.checkout_script.get(&reference).cloned() {
                state.branch = target.branch;
                state.head = Some(target.head);
                if let Some(documents) = target.documents {
                    state.documents = documents;
                }
            } else {
                state.branch = Some(reference.clone());
            }
            Self::ok("")
        };
        Box::pin(async move { Ok(result) })
    }

    fn add_all(&self, _ctx: &RequestContext) -> BoxFuture<'_, Result<()>> {
        self.lock().executed.push("add -A".to_owned());
        Box::pin(async { Ok(()) })
    }

    fn commit(&self, _ctx: &RequestContext, message: String) -> BoxFuture<'_, Result<()>> {
        {
            let mut state = self.lock();
            let next = state
                .commit_hashes
                .pop_front()
                .unwrap_or_else(|| format!("head{}", state.log_len + 1));
            state.head = Some(next);
            state.has_changes = false;
            state.log_len += 1;
            state.executed.push(format!("commit {message}"));
        }
        Box::pin(async { Ok(()) })
    }

    fn status(&self, _ctx: &RequestContext) -> BoxFuture<'_, Result<DoltStatus>> {
        let state = self.lock();
        let status = DoltStatus {
            has_changes: state.has_changes,
            detached_head: state.branch.is_none(),
            branch: state.branch.clone(),
        };
        Box::pin(async move { Ok(status) })
    }

    fn log(&self, _ctx: &RequestContext, limit: u32) -> BoxFuture<'_, Result<Vec<DoltLogEntry>>> {
        let state = self.lock();
        let count = state.log_len.min(limit as usize);
        let head = state.head.clone().unwrap_or_default();
        let entries = (0..count)
            .map(|index| DoltLogEntry {
                hash: if index == 0 {
                    head.clone()
                } else {
                    format!("parent{index}")
                },
                author: Some("dev".to_owned()),
                message: "entry".to_owned(),
            })
            .collect();
        Box::pin(async move { Ok(entries) })
    }

    fn current_branch(&self, _ctx: &RequestContext) -> BoxFuture<'_, Result<Option<String>>> {
        let branch = self.lock().branch.clone();
        Box::pin(async move { Ok(branch) })
    }

    fn head_commit_hash(&self, _ctx: &RequestContext) -> BoxFuture<'_, Result<Option<String>>> {
        let head = self.lock().head.clone();
        Box::pin(async move { Ok(head) })
    }

    fn list_remotes(&self, _ctx: &RequestContext) -> BoxFuture<'_, Result<Vec<DoltRemote>>> {
        let remotes = self.lock().remotes.clone();
        Box::pin(async move { Ok(remotes) })
    }

    fn set_remote(
        &self,
        _ctx: &RequestContext,
        name: String,
        url: String,
    ) -> BoxFuture<'_, Result<()>> {
        let mut state = self.lock();
        state.remotes.retain(|remote| remote.name != name);
        state.remotes.push(DoltRemote { name, url });
        Box::pin(async { Ok(()) })
    }

    fn pull(
        &self,
        _ctx: &RequestContext,
        _remote: String,
        _branch: String,
    ) -> BoxFuture<'_, Result<DoltCommandResult>> {
        let result = {
            let mut state = self.lock();
            state.executed.push("pull".to_owned());
            let result = state.pull_result.clone().unwrap_or_else(|| Self::ok(""));
            if result.success {
                if let Some(post) = state.post_pull.clone() {
                    state.head = Some(post.head);
                    state.documents = post.documents;
                }
            }
            result
        };
        Box::pin(async move { Ok(result) })
    }

    fn push(
        &self,
        _ctx: &RequestContext,
        _remote: String,
        _branch: String,
        _force: bool,
    ) -> BoxFuture<'_, Result<DoltCommandResult>> {
        let result = {
            let mut state = self.lock();
            state.executed.push("push".to_owned());
            state
                .push_results
                .pop_front()
                .unwrap_or_else(|| Self::ok("Everything up-to-date\n"))
        };
        Box::pin(async move { Ok(result) })
    }

    fn fetch(
        &self,
        _ctx: &RequestContext,
        _remote: String,
    ) -> BoxFuture<'_, Result<DoltCommandResult>> {
        self.lock().executed.push("fetch".to_owned());
        Box::pin(async { Ok(Self::ok("")) })
    }

    fn merge(
        &self,
        _ctx: &RequestContext,
        _reference: String,
    ) -> BoxFuture<'_, Result<DoltCommandResult>> {
        Box::pin(async { Ok(Self::ok("")) })
    }

    fn merge_base(
        &self,
        _ctx: &RequestContext,
        left: String,
        right: String,
    ) -> BoxFuture<'_, Result<Option<String>>> {
        let base = {
            let state = self.lock();
            if left == right || state.ancestors.contains(&(left.clone(), right.clone())) {
                Some(left)
            } else {
                None
            }
        };
        Box::pin(async move { Ok(base) })
    }

    fn reset(
        &self,
        _ctx: &RequestContext,
        _reference: String,
        _mode: ResetMode,
    ) -> BoxFuture<'_, Result<DoltCommandResult>> {
        Box::pin(async { Ok(Self::ok("")) })
    }

    fn query(&self, _ctx: &RequestContext, sql: String) -> BoxFuture<'_, Result<Vec<DoltRow>>> {
        let rows = {
            let state = self.lock();
            if sql.starts_with("SHOW TABLES") {
                state
                    .tables
                    .iter()
                    .map(|table| {
                        let mut row = DoltRow::new();
                        row.insert("Tables_in_db".to_owned(), json!(table));
                        row
                    })
                    .collect()
            } else if sql.starts_with("SELECT id, collection, content, metadata_json") {
                state
                    .documents
                    .iter()
                    .map(|((collection, id), (content, metadata))| {
                        let mut row = DoltRow::new();
                        row.insert("id".to_owned(), json!(id));
                        row.insert("collection".to_owned(), json!(collection));
                        row.insert("content".to_owned(), json!(content));
                        row.insert(
                            "metadata_json".to_owned(),
                            metadata.clone().map_or(Value::Null, Value::String),
                        );
                        row
                    })
                    .collect()
            } else if sql.starts_with("SELECT DISTINCT collection FROM sync_log") {
                state
                    .sync_logged
                    .iter()
                    .map(|collection| {
                        let mut row = DoltRow::new();
                        row.insert("collection".to_owned(), json!(collection));
                        row
                    })
                    .collect()
            } else if sql.starts_with("SELECT COUNT(*) AS n FROM documents") {
                let mut row = DoltRow::new();
                row.insert("n".to_owned(), json!(state.documents.len() as i64));
                vec![row]
            } else {
                Vec::new()
            }
        };
        Box::pin(async move { Ok(rows) })
    }

    fn execute(&self, _ctx: &RequestContext, sql: String) -> BoxFuture<'_, Result<()>> {
        {
            let mut state = self.lock();
            state.executed.push(sql.clone());
            FakeDolt::apply_documents_statement(&mut state, &sql);
        }
        Box::pin(async { Ok(()) })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────────

struct Harness {
    dolt: Arc<FakeDolt>,
    dolt_port: Arc<dyn DoltPort>,
    store: Arc<dyn VectorStorePort>,
    manifest: Arc<dyn ManifestPort>,
    checker: Arc<SyncStateChecker>,
    root: PathBuf,
    _worker: embranch_adapters::StoreWorker,
}

impl Harness {
    fn new(tag: &str, fake: FakeDolt) -> Self {
        let root = std::env::temp_dir().join(format!(
            "embranch-app-it-{tag}-{}",
            std::process::id()
        ));
        std::fs::remove_dir_all(&root).ok();
        std::fs::create_dir_all(&root).expect("mkdir");

        let dolt = Arc::new(fake);
        let dolt_port: Arc<dyn DoltPort> = Arc::clone(&dolt) as Arc<dyn DoltPort>;

        let local = LocalStore::open(root.join("chroma"), Arc::new(HashEmbedding::default()))
            .expect("open store");
        let (handle, worker) = spawn_store_worker(local, 32);
        let store: Arc<dyn VectorStorePort> = Arc::new(handle);

        let manifest: Arc<dyn ManifestPort> = Arc::new(ManifestStore::new(root.clone()));

        let checker = Arc::new(SyncStateChecker::new(
            Arc::clone(&dolt_port),
            Arc::clone(&manifest),
        ));

        Self {
            dolt,
            dolt_port,
            store,
            manifest,
            checker,
            root,
            _worker: worker,
        }
    }

    fn push_deps(&self) -> ProcessPushDeps {
        ProcessPushDeps {
            dolt: Arc::clone(&self.dolt_port),
            store: Arc::clone(&self.store),
            manifest: Arc::clone(&self.manifest),
            checker: Arc::clone(&self.checker),
            logger: None,
        }
    }

    fn pull_deps(&self) -> ProcessPullDeps {
        ProcessPullDeps {
            dolt: Arc::clone(&self.dolt_port),
            store: Arc::clone(&self.store),
            manifest: Arc::clone(&self.manifest),
            checker: Arc::clone(&self.checker),
            logger: None,
        }
    }

    fn checkout_deps(&self) -> ProcessCheckoutDeps {
        ProcessCheckoutDeps {
            dolt: Arc::clone(&self.dolt_port),
            store: Arc::clone(&self.store),
            manifest: Arc::clone(&self.manifest),
            checker: Arc::clone(&self.checker),
            logger: None,
        }
    }

    fn init_deps(&self) -> InitializeDeps {
        InitializeDeps {
            dolt: Arc::clone(&self.dolt_port),
            store: Arc::clone(&self.store),
            manifest: Arc::clone(&self.manifest),
            checker: Arc::clone(&self.checker),
            logger: None,
        }
    }

    fn detector_deps(&self) -> ChangeDetectorDeps {
        ChangeDetectorDeps {
            dolt: Arc::clone(&self.dolt_port),
            store: Arc::clone(&self.store),
            logger: None,
        }
    }

    async fn seed_store(&self, collection: &str, docs: &[(&str, &str)]) {
        let ctx = RequestContext::new_request();
        self.store
            .create_collection(&ctx, name(collection), None)
            .await
            .expect("create collection");
        if !docs.is_empty() {
            let inputs = docs
                .iter()
                .map(|(doc_id, content)| DocumentInput {
                    id: id(doc_id),
                    content: (*content).to_owned(),
                    metadata: None,
                })
                .collect();
            self.store
                .add_documents(&ctx, name(collection), inputs, false)
                .await
                .expect("seed docs");
        }
    }

    fn cleanup(&self) {
        std::fs::remove_dir_all(&self.root).ok();
    }
}

fn name(value: &str) -> CollectionName {
    CollectionName::parse(value).expect("collection name")
}

fn id(value: &str) -> DocumentId {
    DocumentId::parse(value).expect("document id")
}

// ─────────────────────────────────────────────────────────────────────────────
// C5: sync-state checker
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn checker_reports_in_sync_and_caches() {
    let harness = Harness::new("c5-insync", FakeDolt::new("c5-insync").with_schema());
    let ctx = RequestContext::new_request();

    let mut manifest = harness
        .manifest
        .create_default(None, None, InitMode::Auto)
        .expect("manifest");
    manifest.update_dolt_state(Some("abcd123".to_owned()), Some("main".to_owned()));
    harness.manifest.write(&manifest).expect("write");

    let check = harness.checker.check(&ctx).await.expect("check");
    assert!(check.in_sync);
    assert_eq!(check.reason, SyncStateReason::InSync);

    // Mutate the fake behind the cache; the cached result must persist
    // until invalidated.
    harness.dolt.lock().head = Some("moved999".to_owned());
    let cached = harness.checker.check(&ctx).await.expect("check");
    assert!(cached.in_sync);

    harness.checker.invalidate().await;
    let fresh = harness.checker.check(&ctx).await.expect("check");
    assert!(!fresh.in_sync);
    assert_eq!(fresh.reason, SyncStateReason::CommitMismatch);

    harness.cleanup();
}

#[tokio::test]
async fn checker_flags_dirty_tree_and_local_ahead() {
    let harness = Harness::new("c5-dirty", FakeDolt::new("c5-dirty").with_schema());
    let ctx = RequestContext::new_request();

    let mut manifest = harness
        .manifest
        .create_default(None, None, InitMode::Auto)
        .expect("manifest");
    manifest.update_dolt_state(Some("abcd123".to_owned()), Some("main".to_owned()));
    harness.manifest.write(&manifest).expect("write");

    harness.dolt.lock().has_changes = true;
    let check = harness.checker.check(&ctx).await.expect("check");
    assert!(!check.in_sync, "a dirty tree can never be in sync");
    assert!(check.has_local_changes);
    assert_eq!(check.reason, SyncStateReason::LocalChanges);
    assert!(!check.safe_to_sync());

    // Local commits on top of the manifest commit.
    {
        let mut state = harness.dolt.lock();
        state.has_changes = false;
        state.head = Some("newer456".to_owned());
        state
            .ancestors
            .insert(("abcd123".to_owned(), "newer456".to_owned()));
    }
    harness.checker.invalidate().await;
    let check = harness.checker.check(&ctx).await.expect("check");
    assert!(check.local_ahead_of_manifest);
    assert_eq!(check.reason, SyncStateReason::LocalAhead);
    assert!(!check.safe_to_sync());

    harness.cleanup();
}

// ─────────────────────────────────────────────────────────────────────────────
// C6: change detector
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn detector_signals_schema_missing_on_fresh_repository() {
    let fake = FakeDolt::new("c6-fresh");
    fake.lock().initialized = true;
    let harness = Harness::new("c6-fresh", fake);
    let ctx = RequestContext::new_request();

    let detection = detect_changes(&ctx, &harness.detector_deps())
        .await
        .expect("detect");
    assert!(detection.schema_missing);
    assert!(detection.changes.is_empty());

    harness.cleanup();
}

#[tokio::test]
async fn detector_classifies_added_modified_deleted() {
    let harness = Harness::new("c6-sets", FakeDolt::new("c6-sets").with_schema());
    let ctx = RequestContext::new_request();

    harness
        .seed_store("notes", &[("fresh", "store only"), ("changed", "new text")])
        .await;

    {
        let mut state = harness.dolt.lock();
        state.documents.insert(
            ("notes".to_owned(), "changed".to_owned()),
            ("old text".to_owned(), None),
        );
        state.documents.insert(
            ("notes".to_owned(), "gone".to_owned()),
            ("removed locally".to_owned(), None),
        );
        // Deletion detection requires a prior sync for the collection.
        state.sync_logged.insert("notes".to_owned());
    }

    let detection = detect_changes(&ctx, &harness.detector_deps())
        .await
        .expect("detect");
    let changes = detection.changes;
    assert_eq!(
        changes
            .added
            .iter()
            .map(|doc| doc.id.as_str())
            .collect::<Vec<_>>(),
        vec!["fresh"]
    );
    assert_eq!(
        changes
            .modified
            .iter()
            .map(|doc| doc.id.as_str())
            .collect::<Vec<_>>(),
        vec!["changed"]
    );
    assert_eq!(
        changes
            .deleted
            .iter()
            .map(|key| key.id.as_str())
            .collect::<Vec<_>>(),
        vec!["gone"]
    );

    harness.cleanup();
}

#[tokio::test]
async fn detector_suppresses_deletions_without_prior_sync() {
    let harness = Harness::new("c6-guard", FakeDolt::new("c6-guard").with_schema());
    let ctx = RequestContext::new_request();

    harness.seed_store("notes", &[]).await;
    // A row that arrived via a remote pull and has not been replayed yet:
    // without a sync_log entry it must not read as a local deletion.
    harness.dolt.lock().documents.insert(
        ("notes".to_owned(), "pulled".to_owned()),
        ("from remote".to_owned(), None),
    );

    let detection = detect_changes(&ctx, &harness.detector_deps())
        .await
        .expect("detect");
    assert!(detection.changes.deleted.is_empty());

    harness.cleanup();
}

// ─────────────────────────────────────────────────────────────────────────────
// C7: push flow
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn push_flushes_commits_and_updates_manifest() {
    let fake = FakeDolt::new("c7-push").with_schema();
    {
        let mut state = fake.lock();
        state.commit_hashes.push_back("def5678".to_owned());
        state
            .push_results
            .push_back(FakeDolt::ok("   abc1234..def5678  main -> main\n"));
        state.sync_logged.clear();
    }
    let harness = Harness::new("c7-push", fake);
    harness
        .manifest
        .create_default(None, None, InitMode::Auto)
        .expect("manifest");
    harness.seed_store("notes", &[("d1", "first"), ("d2", "second")]).await;

    let ctx = RequestContext::new_request();
    let output = process_push(
        &ctx,
        &harness.push_deps(),
        ProcessPushInput {
            remote: "origin".to_owned(),
            branch: "main".to_owned(),
        },
    )
    .await
    .expect("push");

    assert!(output.committed);
    assert_eq!(output.flushed.added.len(), 2);
    assert_eq!(
        output.report.outcome,
        embranch_domain::PushOutcome::CommitRange {
            from: "abc1234".to_owned(),
            to: "def5678".to_owned(),
            target: "main".to_owned(),
        }
    );

    // Rows landed in the documents table, the commit advanced HEAD, and the
    // manifest tracks the new head.
    {
        let state = harness.dolt.lock();
        assert_eq!(state.documents.len(), 2);
        assert!(state.sync_logged.contains("notes"));
        assert_eq!(state.head.as_deref(), Some("def5678"));
    }
    let manifest = harness.manifest.read().expect("read").expect("present");
    assert_eq!(manifest.dolt.current_commit.as_deref(), Some("def5678"));

    harness.cleanup();
}

#[tokio::test]
async fn push_is_idempotent_without_intervening_changes() {
    let fake = FakeDolt::new("c7-idem").with_schema();
    {
        let mut state = fake.lock();
        state.commit_hashes.push_back("def5678".to_owned());
        state
            .push_results
            .push_back(FakeDolt::ok("   abc1234..def5678  main -> main\n"));
        state
            .push_results
            .push_back(FakeDolt::ok("Everything up-to-date\n"));
    }
    let harness = Harness::new("c7-idem", fake);
    harness
        .manifest
        .create_default(None, None, InitMode::Auto)
        .expect("manifest");
    harness.seed_store("notes", &[("d1", "only doc")]).await;

    let ctx = RequestContext::new_request();
    let deps = harness.push_deps();
    let input = ProcessPushInput {
        remote: "origin".to_owned(),
        branch: "main".to_owned(),
    };

    process_push(&ctx, &deps, input.clone()).await.expect("first push");
    let manifest_after_first = harness.manifest.read().expect("read").expect("present");
    let head_after_first = harness.dolt.lock().head.clone();

    let second = process_push(&ctx, &deps, input).await.expect("second push");
    assert!(!second.committed, "no changes means no second commit");
    assert_eq!(
        second.report.outcome,
        embranch_domain::PushOutcome::UpToDate
    );

    // Manifest and Dolt HEAD are byte-identical after the second call.
    let manifest_after_second = harness.manifest.read().expect("read").expect("present");
    assert_eq!(manifest_after_first, manifest_after_second);
    assert_eq!(harness.dolt.lock().head, head_after_first);

    harness.cleanup();
}

#[tokio::test]
async fn rejected_push_surfaces_without_touching_manifest() {
    let fake = FakeDolt::new("c7-reject").with_schema();
    fake.lock().push_results.push_back(FakeDolt::fail(
        "! [rejected] main -> main (non-fast-forward)\n",
    ));
    let harness = Harness::new("c7-reject", fake);
    let manifest = harness
        .manifest
        .create_default(None, None, InitMode::Auto)
        .expect("manifest");

    let ctx = RequestContext::new_request();
    let error = process_push(
        &ctx,
        &harness.push_deps(),
        ProcessPushInput {
            remote: "origin".to_owned(),
            branch: "main".to_owned(),
        },
    )
    .await
    .expect_err("rejected push must fail");

    assert_eq!(error.code, ErrorCode::rejected());
    assert_eq!(
        error.action_required(),
        Some("Pull first to get remote changes")
    );
    let after = harness.manifest.read().expect("read").expect("present");
    assert_eq!(manifest, after, "manifest must be untouched");

    harness.cleanup();
}

// ─────────────────────────────────────────────────────────────────────────────
// C7: pull flow
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn pull_replays_remote_changes_into_store() {
    let fake = FakeDolt::new("c7-pull").with_schema();
    {
        let mut state = fake.lock();
        state.documents.insert(
            ("notes".to_owned(), "keep".to_owned()),
            ("unchanged".to_owned(), None),
        );
        state.documents.insert(
            ("notes".to_owned(), "stale".to_owned()),
            ("to be removed".to_owned(), None),
        );
        let mut post = state.documents.clone();
        post.remove(&("notes".to_owned(), "stale".to_owned()));
        post.insert(
            ("notes".to_owned(), "incoming".to_owned()),
            ("from remote".to_owned(), Some(r#"{"origin":"remote"}"#.to_owned())),
        );
        state.post_pull = Some(PostPull {
            head: "pulled789".to_owned(),
            documents: post,
        });
    }
    let harness = Harness::new("c7-pull", fake);
    harness
        .manifest
        .create_default(None, None, InitMode::Auto)
        .expect("manifest");
    harness
        .seed_store("notes", &[("keep", "unchanged"), ("stale", "to be removed")])
        .await;

    let ctx = RequestContext::new_request();
    let output = process_pull(
        &ctx,
        &harness.pull_deps(),
        ProcessPullInput {
            remote: "origin".to_owned(),
            branch: "main".to_owned(),
        },
    )
    .await
    .expect("pull");

    assert_eq!(output.replayed.added, 1);
    assert_eq!(output.replayed.deleted, 1);
    assert_eq!(output.head_commit.as_deref(), Some("pulled789"));

    let docs = harness
        .store
        .get_documents(&ctx, name("notes"), None, None, None)
        .await
        .expect("get");
    let ids: Vec<&str> = docs.iter().map(|doc| doc.id.as_str()).collect();
    assert!(ids.contains(&"incoming"));
    assert!(ids.contains(&"keep"));
    assert!(!ids.contains(&"stale"));

    let manifest = harness.manifest.read().expect("read").expect("present");
    assert_eq!(manifest.dolt.current_commit.as_deref(), Some("pulled789"));

    harness.cleanup();
}

#[tokio::test]
async fn pull_conflict_aborts_without_manifest_update() {
    let fake = FakeDolt::new("c7-conflict").with_schema();
    fake.lock().pull_result = Some(FakeDolt::fail(
        "CONFLICT (content): merge conflict in documents\n",
    ));
    let harness = Harness::new("c7-conflict", fake);
    let manifest = harness
        .manifest
        .create_default(None, None, InitMode::Auto)
        .expect("manifest");

    let ctx = RequestContext::new_request();
    let error = process_pull(
        &ctx,
        &harness.pull_deps(),
        ProcessPullInput {
            remote: "origin".to_owned(),
            branch: "main".to_owned(),
        },
    )
    .await
    .expect_err("conflicted pull must fail");

    assert_eq!(error.code, ErrorCode::conflict());
    assert!(error.action_required().is_some());
    let after = harness.manifest.read().expect("read").expect("present");
    assert_eq!(manifest, after);

    harness.cleanup();
}

// ─────────────────────────────────────────────────────────────────────────────
// C7: checkout flow
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn checkout_refuses_to_lose_uncommitted_work() {
    let fake = FakeDolt::new("c7-co-dirty").with_schema();
    fake.lock().has_changes = true;
    let harness = Harness::new("c7-co-dirty", fake);
    harness
        .manifest
        .create_default(None, None, InitMode::Auto)
        .expect("manifest");

    let ctx = RequestContext::new_request();
    let error = process_checkout(
        &ctx,
        &harness.checkout_deps(),
        ProcessCheckoutInput {
            reference: "feature".to_owned(),
            create_branch: false,
            skip_safety_check: false,
        },
    )
    .await
    .expect_err("dirty tree must refuse checkout");

    assert_eq!(error.code, ErrorCode::conflict());
    assert_eq!(error.action_required(), Some("commit local changes, then retry"));
    let executed = harness.dolt.lock().executed.clone();
    assert!(
        !executed.iter().any(|cmd| cmd.starts_with("checkout")),
        "no working-tree-altering command may run: {executed:?}"
    );

    harness.cleanup();
}

#[tokio::test]
async fn checkout_switches_and_reconciles_store() {
    let fake = FakeDolt::new("c7-co").with_schema();
    {
        let mut state = fake.lock();
        state.documents.insert(
            ("notes".to_owned(), "on-main".to_owned()),
            ("main content".to_owned(), None),
        );
        let mut feature_docs = BTreeMap::new();
        feature_docs.insert(
            ("notes".to_owned(), "on-feature".to_owned()),
            ("feature content".to_owned(), None),
        );
        state.checkout_script.insert(
            "feature".to_owned(),
            CheckoutTarget {
                branch: Some("feature".to_owned()),
                head: "feat999".to_owned(),
                documents: Some(feature_docs),
            },
        );
    }
    let harness = Harness::new("c7-co", fake);
    harness
        .manifest
        .create_default(None, None, InitMode::Auto)
        .expect("manifest");
    harness.seed_store("notes", &[("on-main", "main content")]).await;

    let ctx = RequestContext::new_request();
    let output = process_checkout(
        &ctx,
        &harness.checkout_deps(),
        ProcessCheckoutInput {
            reference: "feature".to_owned(),
            create_branch: false,
            skip_safety_check: false,
        },
    )
    .await
    .expect("checkout");

    assert_eq!(output.branch.as_deref(), Some("feature"));
    assert_eq!(output.head_commit.as_deref(), Some("feat999"));
    assert_eq!(output.replayed.added, 1);
    assert_eq!(output.replayed.deleted, 1);

    let docs = harness
        .store
        .get_documents(&ctx, name("notes"), None, None, None)
        .await
        .expect("get");
    let ids: Vec<&str> = docs.iter().map(|doc| doc.id.as_str()).collect();
    assert_eq!(ids, vec!["on-feature"]);

    let manifest = harness.manifest.read().expect("read").expect("present");
    assert_eq!(manifest.dolt.current_branch.as_deref(), Some("feature"));
    assert_eq!(manifest.dolt.current_commit.as_deref(), Some("feat999"));

    harness.cleanup();
}

// ─────────────────────────────────────────────────────────────────────────────
// C8: initializer
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_workstation_with_remote_clones() {
    // Scenario: manifest absent, DOLT_REMOTE_URL set, init_mode=auto.
    let harness = Harness::new("c8-clone", FakeDolt::new("c8-clone"));
    let ctx = RequestContext::new_request();

    let output = initialize(
        &ctx,
        &harness.init_deps(),
        InitializeInput {
            use_manifest: true,
            init_mode: Some(InitMode::Auto),
            remote_url_seed: Some("https://dolthub.com/org/repo".to_owned()),
        },
    )
    .await
    .expect("initialize");

    assert_eq!(output.status, InitStatus::Cloned);
    let manifest = output.manifest.expect("manifest");
    assert_eq!(
        manifest.dolt.remote_url.as_deref(),
        Some("https://dolthub.com/org/repo")
    );
    assert_eq!(manifest.dolt.default_branch, "main");
    // current_commit populated from the cloned HEAD.
    assert_eq!(manifest.dolt.current_commit.as_deref(), Some("clonedhead1"));

    harness.cleanup();
}

#[tokio::test]
async fn fresh_workstation_without_remote_is_pending() {
    // Scenario: manifest absent, no remote seed. Dolt must NOT be initialized.
    let harness = Harness::new("c8-pending", FakeDolt::new("c8-pending"));
    let ctx = RequestContext::new_request();

    let output = initialize(
        &ctx,
        &harness.init_deps(),
        InitializeInput {
            use_manifest: true,
            init_mode: Some(InitMode::Auto),
            remote_url_seed: None,
        },
    )
    .await
    .expect("initialize");

    assert_eq!(output.status, InitStatus::PendingConfiguration);
    let manifest = output.manifest.expect("manifest created");
    assert_eq!(manifest.dolt.remote_url, None);
    assert!(
        !harness.dolt.lock().initialized,
        "initializer must never run dolt init"
    );

    // Recovery path: set_remote + clone succeeds.
    harness
        .manifest
        .set_remote("https://dolthub.com/org/repo".to_owned())
        .expect("set remote");
    let cloned = process_clone(
        &ctx,
        &harness.init_deps(),
        ProcessCloneInput {
            url: "https://dolthub.com/org/repo".to_owned(),
            force: false,
        },
    )
    .await
    .expect("clone");
    assert_eq!(cloned.status, InitStatus::Cloned);

    harness.cleanup();
}

#[tokio::test]
async fn matching_state_is_in_sync_at_startup() {
    // Scenario: manifest main@abcd123, local main@abcd123, clean.
    let harness = Harness::new("c8-insync", FakeDolt::new("c8-insync").with_schema());
    let mut manifest = harness
        .manifest
        .create_default(None, None, InitMode::Auto)
        .expect("manifest");
    manifest.update_dolt_state(Some("abcd123".to_owned()), Some("main".to_owned()));
    harness.manifest.write(&manifest).expect("write");

    let ctx = RequestContext::new_request();
    let output = initialize(
        &ctx,
        &harness.init_deps(),
        InitializeInput {
            use_manifest: true,
            init_mode: Some(InitMode::Auto),
            remote_url_seed: None,
        },
    )
    .await
    .expect("initialize");

    assert_eq!(output.status, InitStatus::InSync);

    harness.cleanup();
}

#[tokio::test]
async fn diverged_clean_workstation_reconciles_under_auto() {
    // Scenario: manifest main@abcd123, local feature@beef456, clean, auto.
    let fake = FakeDolt::new("c8-auto").with_schema();
    {
        let mut state = fake.lock();
        state.branch = Some("feature".to_owned());
        state.head = Some("beef456".to_owned());
        state.checkout_script.insert(
            "abcd123".to_owned(),
            CheckoutTarget {
                branch: Some("main".to_owned()),
                head: "abcd123".to_owned(),
                documents: None,
            },
        );
    }
    let harness = Harness::new("c8-auto", fake);
    let mut manifest = harness
        .manifest
        .create_default(None, None, InitMode::Auto)
        .expect("manifest");
    manifest.update_dolt_state(Some("abcd123".to_owned()), Some("main".to_owned()));
    harness.manifest.write(&manifest).expect("write");
    let before = harness.manifest.read().expect("read").expect("present");

    let ctx = RequestContext::new_request();
    let output = initialize(
        &ctx,
        &harness.init_deps(),
        InitializeInput {
            use_manifest: true,
            init_mode: Some(InitMode::Auto),
            remote_url_seed: None,
        },
    )
    .await
    .expect("initialize");

    assert_eq!(output.status, InitStatus::Reconciled);
    assert_eq!(harness.dolt.lock().head.as_deref(), Some("abcd123"));
    // The manifest already named this target; reconciliation leaves it alone.
    let after = harness.manifest.read().expect("read").expect("present");
    assert_eq!(before, after);

    harness.cleanup();
}

#[tokio::test]
async fn diverged_workstation_stays_put_under_manual() {
    let fake = FakeDolt::new("c8-manual").with_schema();
    {
        let mut state = fake.lock();
        state.branch = Some("feature".to_owned());
        state.head = Some("beef456".to_owned());
    }
    let harness = Harness::new("c8-manual", fake);
    let mut manifest = harness
        .manifest
        .create_default(None, None, InitMode::Manual)
        .expect("manifest");
    manifest.update_dolt_state(Some("abcd123".to_owned()), Some("main".to_owned()));
    harness.manifest.write(&manifest).expect("write");

    let ctx = RequestContext::new_request();
    let output = initialize(
        &ctx,
        &harness.init_deps(),
        InitializeInput {
            use_manifest: true,
            init_mode: Some(InitMode::Manual),
            remote_url_seed: None,
        },
    )
    .await
    .expect("initialize");

    assert_eq!(output.status, InitStatus::OutOfSync);
    assert_eq!(harness.dolt.lock().head.as_deref(), Some("beef456"));
    let check = output.check.expect("check");
    assert!(!check.in_sync);

    harness.cleanup();
}

#[tokio::test]
async fn dirty_workstation_is_never_reconciled() {
    let fake = FakeDolt::new("c8-dirty").with_schema();
    {
        let mut state = fake.lock();
        state.branch = Some("feature".to_owned());
        state.head = Some("beef456".to_owned());
        state.has_changes = true;
    }
    let harness = Harness::new("c8-dirty", fake);
    let mut manifest = harness
        .manifest
        .create_default(None, None, InitMode::Auto)
        .expect("manifest");
    manifest.update_dolt_state(Some("abcd123".to_owned()), Some("main".to_owned()));
    harness.manifest.write(&manifest).expect("write");

    let ctx = RequestContext::new_request();
    let output = initialize(
        &ctx,
        &harness.init_deps(),
        InitializeInput {
            use_manifest: true,
            init_mode: Some(InitMode::Auto),
            remote_url_seed: None,
        },
    )
    .await
    .expect("initialize");

    assert_eq!(output.status, InitStatus::OutOfSync);
    let check = output.check.expect("check");
    assert!(check.has_local_changes);
    let executed = harness.dolt.lock().executed.clone();
    assert!(
        !executed.iter().any(|cmd| cmd.starts_with("checkout")),
        "never-lose-work: {executed:?}"
    );

    harness.cleanup();
}

// ─────────────────────────────────────────────────────────────────────────────
// C8: emptiness heuristic and forced clone
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn emptiness_heuristic_checks_commits_rows_and_tables() {
    let harness = Harness::new("c8-empty", FakeDolt::new("c8-empty").with_schema());
    let ctx = RequestContext::new_request();

    // Two bookkeeping commits, no documents, no user tables: empty.
    harness.dolt.lock().log_len = 2;
    assert!(is_repository_empty(&ctx, &harness.dolt_port).await.expect("check"));

    // Three commits: not empty.
    harness.dolt.lock().log_len = 3;
    assert!(!is_repository_empty(&ctx, &harness.dolt_port).await.expect("check"));

    // Documents present: not empty.
    {
        let mut state = harness.dolt.lock();
        state.log_len = 1;
        state.documents.insert(
            ("notes".to_owned(), "d1".to_owned()),
            ("content".to_owned(), None),
        );
    }
    assert!(!is_repository_empty(&ctx, &harness.dolt_port).await.expect("check"));

    // A non-schema user table: not empty.
    {
        let mut state = harness.dolt.lock();
        state.documents.clear();
        state.tables.insert("user_table".to_owned());
    }
    assert!(!is_repository_empty(&ctx, &harness.dolt_port).await.expect("check"));

    harness.cleanup();
}

#[tokio::test]
async fn forced_clone_refuses_non_empty_repository() {
    let fake = FakeDolt::new("c8-force").with_schema();
    fake.lock().log_len = 5;
    let harness = Harness::new("c8-force", fake);
    harness
        .manifest
        .create_default(None, None, InitMode::Auto)
        .expect("manifest");

    let ctx = RequestContext::new_request();
    let error = process_clone(
        &ctx,
        &harness.init_deps(),
        ProcessCloneInput {
            url: "https://dolthub.com/org/repo".to_owned(),
            force: true,
        },
    )
    .await
    .expect_err("must refuse");
    assert_eq!(error.code, ErrorCode::conflict());

    let unforced = process_clone(
        &ctx,
        &harness.init_deps(),
        ProcessCloneInput {
            url: "https://dolthub.com/org/repo".to_owned(),
            force: false,
        },
    )
    .await
    .expect_err("must refuse without force");
    assert_eq!(unforced.code, ErrorCode::already_initialized());

    harness.cleanup();
}
