//! Server state: configured adapters behind their ports, the write-path
//! mutex, and startup/shutdown lifecycle.
//!
//! At most one write-path operation (checkout, commit, pull, push, merge,
//! reset, init, clone, manifest write) runs at a time; read operations run
//! concurrently with each other. The store worker serializes vector store
//! access on its own.

use embranch_adapters::{
    DoltCli, HashEmbedding, LocalStore, ManifestStore, StoreWorker, TracingLogger,
    spawn_store_worker,
};
use embranch_app::{
    InitializeDeps, InitializeInput, InitializeOutput, ProcessCheckoutDeps, ProcessPullDeps,
    ProcessPushDeps, SyncStateChecker, initialize,
};
use embranch_config::{EmbranchConfig, load_from_env, resolve_project_root};
use embranch_ports::{DoltPort, LoggerPort, ManifestPort, VectorStorePort};
use embranch_shared::{RequestContext, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Long-lived server state shared by every tool invocation.
pub struct ServerState {
    /// Effective configuration.
    pub config: EmbranchConfig,
    /// Resolved project root.
    pub project_root: PathBuf,
    /// Dolt driver.
    pub dolt: Arc<dyn DoltPort>,
    /// Vector store gateway.
    pub store: Arc<dyn VectorStorePort>,
    /// Manifest persistence.
    pub manifest: Arc<dyn ManifestPort>,
    /// Sync-state checker.
    pub checker: Arc<SyncStateChecker>,
    /// Structured logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    repo_lock: RwLock<()>,
    worker: Mutex<Option<StoreWorker>>,
}

impl ServerState {
    /// Build server state from environment variables, rooted at `cwd`.
    pub async fn from_env(
        environ: &BTreeMap<String, String>,
        cwd: &std::path::Path,
    ) -> Result<(Arc<Self>, Vec<String>)> {
        let loaded = load_from_env(environ)?;
        let project_root = resolve_project_root(&loaded.config, cwd);
        let state = Self::build(loaded.config, project_root).await?;
        Ok((state, loaded.ignored_vars))
    }

    /// Build server state from an explicit configuration.
    pub async fn build(config: EmbranchConfig, project_root: PathBuf) -> Result<Arc<Self>> {
        let repo_root = config.repository_path(&project_root);
        let dolt: Arc<dyn DoltPort> = Arc::new(DoltCli::new(
            config.dolt.executable_path.clone(),
            repo_root,
            config.dolt.command_timeout(),
        ));

        let store_root = config.store_path(&project_root);
        let local = LocalStore::open(store_root, Arc::new(HashEmbedding::default()))?;
        let (store_handle, worker) = spawn_store_worker(local, config.store.queue_capacity);
        let store: Arc<dyn VectorStorePort> = Arc::new(store_handle);

        let manifest: Arc<dyn ManifestPort> = Arc::new(ManifestStore::new(project_root.clone()));
        let checker = Arc::new(SyncStateChecker::new(
            Arc::clone(&dolt),
            Arc::clone(&manifest),
        ));
        let logger: Option<Arc<dyn LoggerPort>> = if config.logging.enabled {
            Some(Arc::new(TracingLogger::new()))
        } else {
            None
        };

        Ok(Arc::new(Self {
            config,
            project_root,
            dolt,
            store,
            manifest,
            checker,
            logger,
            repo_lock: RwLock::new(()),
            worker: Mutex::new(Some(worker)),
        }))
    }

    /// Acquire the write-path lock; held for the whole mutating flow. At
    /// most one write-path operation (checkout, commit, pull, push, merge,
    /// reset, init, clone, manifest write) runs at a time.
    pub async fn lock_writes(&self) -> RwLockWriteGuard<'_, ()> {
        self.repo_lock.write().await
    }

    /// Acquire the shared read lock; read operations run concurrently with
    /// each other but never with a write-path operation.
    pub async fn lock_reads(&self) -> RwLockReadGuard<'_, ()> {
        self.repo_lock.read().await
    }

    /// Run the startup initializer against this state's configuration.
    pub async fn run_initializer(&self, ctx: &RequestContext) -> Result<InitializeOutput> {
        let _guard = self.lock_writes().await;
        initialize(
            ctx,
            &self.initialize_deps(),
            InitializeInput {
                use_manifest: self.config.manifest.use_manifest,
                init_mode: Some(self.config.manifest.init_mode),
                remote_url_seed: self.config.dolt.remote_url.clone(),
            },
        )
        .await
    }

    /// Deps bundle for the initializer and clone recovery.
    #[must_use]
    pub fn initialize_deps(&self) -> InitializeDeps {
        InitializeDeps {
            dolt: Arc::clone(&self.dolt),
            store: Arc::clone(&self.store),
            manifest: Arc::clone(&self.manifest),
            checker: Arc::clone(&self.checker),
            logger: self.logger.clone(),
        }
    }

    /// Deps bundle for the push flow.
    #[must_use]
    pub fn push_deps(&self) -> ProcessPushDeps {
        ProcessPushDeps {
            dolt: Arc::clone(&self.dolt),
            store: Arc::clone(&self.store),
            manifest: Arc::clone(&self.manifest),
            checker: Arc::clone(&self.checker),
            logger: self.logger.clone(),
        }
    }

    /// Deps bundle for the pull flow.
    #[must_use]
    pub fn pull_deps(&self) -> ProcessPullDeps {
        ProcessPullDeps {
            dolt: Arc::clone(&self.dolt),
            store: Arc::clone(&self.store),
            manifest: Arc::clone(&self.manifest),
            checker: Arc::clone(&self.checker),
            logger: self.logger.clone(),
        }
    }

    /// Deps bundle for the checkout flow.
    #[must_use]
    pub fn checkout_deps(&self) -> ProcessCheckoutDeps {
        ProcessCheckoutDeps {
            dolt: Arc::clone(&self.dolt),
            store: Arc::clone(&self.store),
            manifest: Arc::clone(&self.manifest),
            checker: Arc::clone(&self.checker),
            logger: self.logger.clone(),
        }
    }

    /// Drain the store worker and stop.
    pub async fn shutdown(&self) {
        if let Some(worker) = self.worker.lock().await.take() {
            worker.shutdown().await;
        }
    }
}
