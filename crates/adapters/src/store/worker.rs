//! Single cooperative worker owning the embedded store.
//!
//! The store runtime is not safe for parallel use, so every gateway call is
//! marshalled onto one long-lived task through a bounded FIFO queue.
//! Submissions beyond the bound fail fast with `Busy`. A job cancelled
//! before dispatch is skipped unexecuted; once running, cancellation only
//! stops the caller from awaiting the result.

use crate::store::local::LocalStore;
use embranch_domain::{CollectionName, Document, DocumentId};
use embranch_ports::{
    BoxFuture, CollectionInfo, DocumentInput, QueryMatch, VectorStorePort, WhereDocumentFilter,
    WhereFilter,
};
use embranch_shared::{
    CancellationToken, ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result,
};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// One queued gateway call.
enum Job {
    ListCollections {
        limit: Option<u32>,
        offset: Option<u32>,
        reply: oneshot::Sender<Result<Vec<CollectionInfo>>>,
    },
    CreateCollection {
        name: CollectionName,
        metadata: Option<Value>,
        reply: oneshot::Sender<Result<()>>,
    },
    DeleteCollection {
        name: CollectionName,
        reply: oneshot::Sender<Result<()>>,
    },
    AddDocuments {
        ctx: RequestContext,
        name: CollectionName,
        documents: Vec<DocumentInput>,
        upsert: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    GetDocuments {
        name: CollectionName,
        ids: Option<Vec<DocumentId>>,
        where_filter: Option<WhereFilter>,
        where_document: Option<WhereDocumentFilter>,
        reply: oneshot::Sender<Result<Vec<Document>>>,
    },
    QueryDocuments {
        ctx: RequestContext,
        name: CollectionName,
        query_texts: Vec<String>,
        n_results: u32,
        where_filter: Option<WhereFilter>,
        where_document: Option<WhereDocumentFilter>,
        reply: oneshot::Sender<Result<Vec<Vec<QueryMatch>>>>,
    },
    UpdateDocuments {
        ctx: RequestContext,
        name: CollectionName,
        ids: Vec<DocumentId>,
        contents: Option<Vec<String>>,
        metadatas: Option<Vec<Value>>,
        reply: oneshot::Sender<Result<()>>,
    },
    DeleteDocuments {
        name: CollectionName,
        ids: Vec<DocumentId>,
        reply: oneshot::Sender<Result<()>>,
    },
    Count {
        name: CollectionName,
        reply: oneshot::Sender<Result<u64>>,
    },
    /// Test hook: signal start, then hold the worker until released.
    #[cfg(test)]
    Barrier {
        started: oneshot::Sender<()>,
        gate: oneshot::Receiver<()>,
        reply: oneshot::Sender<Result<()>>,
    },
}

struct Submission {
    cancel: CancellationToken,
    job: Job,
}

/// Handle for shutting the worker down.
pub struct StoreWorker {
    join: JoinHandle<()>,
    shutdown_tx: oneshot::Sender<()>,
}

impl StoreWorker {
    /// Stop accepting new jobs, drain the queue, and stop.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.join.await;
    }
}

/// Gateway handle implementing [`VectorStorePort`] by submitting jobs to the
/// worker.
#[derive(Clone)]
pub struct WorkerVectorStore {
    sender: mpsc::Sender<Submission>,
}

/// Spawn the worker that owns `store`; `queue_capacity` bounds the number of
/// submitted-but-undispatched jobs.
#[must_use]
pub fn spawn_store_worker(
    store: LocalStore,
    queue_capacity: usize,
) -> (WorkerVectorStore, StoreWorker) {
    let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let join = tokio::spawn(worker_loop(store, receiver, shutdown_rx));
    (
        WorkerVectorStore { sender },
        StoreWorker { join, shutdown_tx },
    )
}

async fn worker_loop(
    mut store: LocalStore,
    mut receiver: mpsc::Receiver<Submission>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            maybe_submission = receiver.recv() => {
                let Some(submission) = maybe_submission else { return };
                run_job(&mut store, submission).await;
            },
            _ = &mut shutdown_rx => {
                // Drain-at-shutdown: stop accepting, finish what is queued.
                receiver.close();
                while let Some(submission) = receiver.recv().await {
                    run_job(&mut store, submission).await;
                }
                return;
            },
        }
    }
}

async fn run_job(store: &mut LocalStore, submission: Submission) {
    if submission.cancel.is_cancelled() {
        // Cancelled before dispatch: drop the job unexecuted.
        return;
    }

    match submission.job {
        Job::ListCollections {
            limit,
            offset,
            reply,
        } => {
            let _ = reply.send(Ok(store.list_collections(limit, offset)));
        },
        Job::CreateCollection {
            name,
            metadata,
            reply,
        } => {
            let _ = reply.send(store.create_collection(&name, metadata));
        },
        Job::DeleteCollection { name, reply } => {
            let _ = reply.send(store.delete_collection(&name));
        },
        Job::AddDocuments {
            ctx,
            name,
            documents,
            upsert,
            reply,
        } => {
            let _ = reply.send(store.add_documents(&ctx, &name, documents, upsert).await);
        },
        Job::GetDocuments {
            name,
            ids,
            where_filter,
            where_document,
            reply,
        } => {
            let _ = reply.send(store.get_documents(
                &name,
                ids.as_deref(),
                where_filter.as_ref(),
                where_document.as_ref(),
            ));
        },
        Job::QueryDocuments {
            ctx,
            name,
            query_texts,
            n_results,
            where_filter,
            where_document,
            reply,
        } => {
            let _ = reply.send(
                store
                    .query_documents(
                        &ctx,
                        &name,
                        query_texts,
                        n_results,
                        where_filter.as_ref(),
                        where_document.as_ref(),
                    )
                    .await,
            );
        },
        Job::UpdateDocuments {
            ctx,
            name,
            ids,
            contents,
            metadatas,
            reply,
        } => {
            let _ = reply.send(
                store
                    .update_documents(&ctx, &name, ids, contents, metadatas)
                    .await,
            );
        },
        Job::DeleteDocuments { name, ids, reply } => {
            let _ = reply.send(store.delete_documents(&name, &ids));
        },
        Job::Count { name, reply } => {
            let _ = reply.send(store.count(&name));
        },
        #[cfg(test)]
        Job::Barrier {
            started,
            gate,
            reply,
        } => {
            let _ = started.send(());
            let _ = gate.await;
            let _ = reply.send(Ok(()));
        },
    }
}

impl WorkerVectorStore {
    /// Enqueue a job (fail-fast on a full queue) and await its result.
    async fn submit<T, F>(&self, ctx: &RequestContext, operation: &'static str, build: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(oneshot::Sender<Result<T>>) -> Job,
    {
        ctx.ensure_not_cancelled(operation)?;

        let (reply, response) = oneshot::channel::<Result<T>>();
        let submission = Submission {
            cancel: ctx.cancellation_token(),
            job: build(reply),
        };

        self.sender.try_send(submission).map_err(|error| match error {
            mpsc::error::TrySendError::Full(_) => ErrorEnvelope::busy("store worker queue is full")
                .with_metadata("operation", operation)
                .with_action_required("retry once in-flight operations drain"),
            mpsc::error::TrySendError::Closed(_) => ErrorEnvelope::unexpected(
                ErrorCode::internal(),
                "store worker has stopped",
                ErrorClass::NonRetriable,
            ),
        })?;

        tokio::select! {
            () = ctx.cancelled() => Err(ErrorEnvelope::cancelled("operation cancelled")
                .with_metadata("operation", operation)),
            result = response => result.unwrap_or_else(|_| {
                Err(ErrorEnvelope::unexpected(
                    ErrorCode::internal(),
                    "store worker dropped the job result",
                    ErrorClass::NonRetriable,
                ))
            }),
        }
    }
}

impl VectorStorePort for WorkerVectorStore {
    fn list_collections(
        &self,
        ctx: &RequestContext,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> BoxFuture<'_, Result<Vec<CollectionInfo>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            self.submit(&ctx, "store.list_collections", |reply| Job::ListCollections {
                limit,
                offset,
                reply,
            })
            .await
        })
    }

    fn create_collection(
        &self,
        ctx: &RequestContext,
        name: CollectionName,
        metadata: Option<Value>,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            self.submit(&ctx, "store.create_collection", |reply| Job::CreateCollection {
                name,
                metadata,
                reply,
            })
            .await
        })
    }

    fn delete_collection(
        &self,
        ctx: &RequestContext,
        name: CollectionName,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            self.submit(&ctx, "store.delete_collection", |reply| Job::DeleteCollection {
                name,
                reply,
            })
            .await
        })
    }

    fn add_documents(
        &self,
        ctx: &RequestContext,
        name: CollectionName,
        documents: Vec<DocumentInput>,
        upsert: bool,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let job_ctx = ctx.clone();
            self.submit(&ctx, "store.add_documents", |reply| Job::AddDocuments {
                ctx: job_ctx,
                name,
                documents,
                upsert,
                reply,
            })
            .await
        })
    }

    fn get_documents(
        &self,
        ctx: &RequestContext,
        name: CollectionName,
        ids: Option<Vec<DocumentId>>,
        where_filter: Option<WhereFilter>,
        where_document: Option<WhereDocumentFilter>,
    ) -> BoxFuture<'_, Result<Vec<Document>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            self.submit(&ctx, "store.get_documents", |reply| Job::GetDocuments {
                name,
                ids,
                where_filter,
                where_document,
                reply,
            })
            .await
        })
    }

    fn query_documents(
        &self,
        ctx: &RequestContext,
        name: CollectionName,
        query_texts: Vec<String>,
        n_results: u32,
        where_filter: Option<WhereFilter>,
        where_document: Option<WhereDocumentFilter>,
    ) -> BoxFuture<'_, Result<Vec<Vec<QueryMatch>>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let job_ctx = ctx.clone();
            self.submit(&ctx, "store.query_documents", |reply| Job::QueryDocuments {
                ctx: job_ctx,
                name,
                query_texts,
                n_results,
                where_filter,
                where_document,
                reply,
            })
            .await
        })
    }

    fn update_documents(
        &self,
        ctx: &RequestContext,
        name: CollectionName,
        ids: Vec<DocumentId>,
        contents: Option<Vec<String>>,
        metadatas: Option<Vec<Value>>,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let job_ctx = ctx.clone();
            self.submit(&ctx, "store.update_documents", |reply| Job::UpdateDocuments {
                ctx: job_ctx,
                name,
                ids,
                contents,
                metadatas,
                reply,
            })
            .await
        })
    }

    fn delete_documents(
        &self,
        ctx: &RequestContext,
        name: CollectionName,
        ids: Vec<DocumentId>,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            self.submit(&ctx, "store.delete_documents", |reply| Job::DeleteDocuments {
                name,
                ids,
                reply,
            })
            .await
        })
    }

    fn count(&self, ctx: &RequestContext, name: CollectionName) -> BoxFuture<'_, Result<u64>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            self.submit(&ctx, "store.count", |reply| Job::Count { name, reply })
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding_hash::HashEmbedding;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn scratch_store(tag: &str) -> LocalStore {
        let root: PathBuf = std::env::temp_dir().join(format!(
            "embranch-worker-{tag}-{}",
            std::process::id()
        ));
        std::fs::remove_dir_all(&root).ok();
        std::fs::create_dir_all(&root).expect("mkdir");
        LocalStore::open(root, Arc::new(HashEmbedding::default())).expect("open")
    }

    /// Submit a barrier job that occupies the worker until released.
    async fn block_worker(
        handle: &WorkerVectorStore,
    ) -> (oneshot::Sender<()>, tokio::task::JoinHandle<Result<()>>) {
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let (gate_tx, gate_rx) = oneshot::channel::<()>();
        let blocking_handle = handle.clone();
        let mut started_tx = Some(started_tx);
        let mut gate_rx = Some(gate_rx);
        let blocker = tokio::spawn(async move {
            let ctx = RequestContext::new_request();
            let started = started_tx.take().expect("started sender");
            let gate = gate_rx.take().expect("gate receiver");
            blocking_handle
                .submit(&ctx, "test.block", move |reply| Job::Barrier {
                    started,
                    gate,
                    reply,
                })
                .await
        });
        started_rx.await.expect("first job started");
        (gate_tx, blocker)
    }

    #[tokio::test]
    async fn full_queue_fails_fast_with_busy() {
        let (handle, worker) = spawn_store_worker(scratch_store("busy"), 1);
        let (gate_tx, blocker) = block_worker(&handle).await;

        // Second job fills the single queue slot.
        let queued_handle = handle.clone();
        let queued = tokio::spawn(async move {
            let ctx = RequestContext::new_request();
            queued_handle
                .submit(&ctx, "test.queued", |reply| Job::Count {
                    name: CollectionName::parse("none").expect("name"),
                    reply,
                })
                .await
        });
        tokio::task::yield_now().await;

        // Third submission finds the queue full and fails fast.
        let ctx = RequestContext::new_request();
        let error = handle
            .submit(&ctx, "test.overflow", |reply| Job::Count {
                name: CollectionName::parse("none").expect("name"),
                reply,
            })
            .await
            .expect_err("queue must be full");
        assert_eq!(error.code, ErrorCode::busy());
        assert!(error.class.is_retriable());

        let _ = gate_tx.send(());
        blocker.await.expect("join").expect("blocker result");
        // The queued count targets a missing collection; a NotFound result
        // proves the job ran after the barrier lifted.
        let queued_result = queued.await.expect("join");
        assert!(matches!(queued_result, Err(ref e) if e.code == ErrorCode::not_found()));

        drop(handle);
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn cancellation_before_dispatch_skips_the_job() {
        let (handle, worker) = spawn_store_worker(scratch_store("cancel"), 4);
        let (gate_tx, blocker) = block_worker(&handle).await;

        // Create a collection job that will be cancelled while queued.
        let cancelled_ctx = RequestContext::new_request();
        let token = cancelled_ctx.cancellation_token();
        let queued_handle = handle.clone();
        let queued = tokio::spawn(async move {
            queued_handle
                .submit(&cancelled_ctx, "test.cancelled", |reply| {
                    Job::CreateCollection {
                        name: CollectionName::parse("ghost").expect("name"),
                        metadata: None,
                        reply,
                    }
                })
                .await
        });
        tokio::task::yield_now().await;

        token.cancel();
        let result = queued.await.expect("join");
        assert!(matches!(result, Err(ref error) if error.is_cancelled()));

        let _ = gate_tx.send(());
        blocker.await.expect("join").expect("blocker result");

        // The cancelled job never executed: the collection does not exist.
        let ctx = RequestContext::new_request();
        let listed = handle
            .submit(&ctx, "test.list", |reply| Job::ListCollections {
                limit: None,
                offset: None,
                reply,
            })
            .await
            .expect("list");
        assert!(listed.is_empty(), "cancelled job must not execute");

        drop(handle);
        worker.shutdown().await;
    }
}
