//! Change detector: the vector store diffed against the Dolt `documents`
//! table.
//!
//! Produces three disjoint sets: added (store-only), modified (content or
//! canonical metadata differs), deleted (Dolt-only). Deletion detection is
//! scoped to collections that still exist in the store and is guarded by
//! the `sync_log` audit table so that rows added by a remote pull are not
//! immediately reported as local deletions.

use crate::documents_table;
use embranch_domain::{Document, DocumentRef, LocalChanges, metadata_equal};
use embranch_ports::{DoltPort, LogFields, LoggerPort, VectorStorePort};
use embranch_shared::{RequestContext, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Dependencies for change detection.
#[derive(Clone)]
pub struct ChangeDetectorDeps {
    /// Dolt driver.
    pub dolt: Arc<dyn DoltPort>,
    /// Vector store gateway.
    pub store: Arc<dyn VectorStorePort>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
}

/// Detection result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChangeDetection {
    /// Divergent documents.
    pub changes: LocalChanges,
    /// True when the documents table does not exist yet (fresh repository).
    pub schema_missing: bool,
}

/// Diff the vector store against the Dolt `documents` table.
pub async fn detect_changes(
    ctx: &RequestContext,
    deps: &ChangeDetectorDeps,
) -> Result<ChangeDetection> {
    ctx.ensure_not_cancelled("change_detection.detect")?;

    if !documents_table::schema_exists(ctx, &deps.dolt).await? {
        return Ok(ChangeDetection {
            changes: LocalChanges::default(),
            schema_missing: true,
        });
    }

    let store_documents = read_store_documents(ctx, deps).await?;
    let dolt_documents = documents_table::read_all_documents(ctx, &deps.dolt).await?;
    let synced = documents_table::synced_collections(ctx, &deps.dolt).await?;

    let store_by_key: BTreeMap<DocumentRef, &Document> = store_documents
        .iter()
        .map(|doc| (doc.as_ref_key(), doc))
        .collect();
    let dolt_by_key: BTreeMap<DocumentRef, &Document> = dolt_documents
        .iter()
        .map(|doc| (doc.as_ref_key(), doc))
        .collect();

    let store_collections: std::collections::BTreeSet<&str> = store_documents
        .iter()
        .map(|doc| doc.collection.as_str())
        .collect();

    let mut changes = LocalChanges::default();

    for (key, store_doc) in &store_by_key {
        match dolt_by_key.get(key) {
            None => changes.added.push((*store_doc).clone()),
            Some(dolt_doc) => {
                let content_differs = store_doc.content != dolt_doc.content;
                let metadata_differs =
                    !metadata_equal(store_doc.metadata.as_ref(), dolt_doc.metadata.as_ref());
                if content_differs || metadata_differs {
                    changes.modified.push((*store_doc).clone());
                }
            },
        }
    }

    for key in dolt_by_key.keys() {
        if store_by_key.contains_key(key) {
            continue;
        }
        // Only collections the store still carries, and only where a prior
        // sync recorded convergence, count as local deletions.
        if store_collections.contains(key.collection.as_str())
            && synced.contains(key.collection.as_str())
        {
            changes.deleted.push(key.clone());
        }
    }

    if let Some(logger) = deps.logger.as_ref() {
        let mut fields = LogFields::new();
        fields.insert("added".into(), changes.added.len().into());
        fields.insert("modified".into(), changes.modified.len().into());
        fields.insert("deleted".into(), changes.deleted.len().into());
        logger.debug("change_detection.done", "computed store/Dolt diff", Some(fields));
    }

    Ok(ChangeDetection {
        changes,
        schema_missing: false,
    })
}

/// Collect every document the store currently holds.
async fn read_store_documents(
    ctx: &RequestContext,
    deps: &ChangeDetectorDeps,
) -> Result<Vec<Document>> {
    let collections = deps.store.list_collections(ctx, None, None).await?;
    let mut documents = Vec::new();
    for info in collections {
        let mut batch = deps
            .store
            .get_documents(ctx, info.name, None, None, None)
            .await?;
        documents.append(&mut batch);
    }
    Ok(documents)
}
