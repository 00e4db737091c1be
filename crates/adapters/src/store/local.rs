//! Embedded collection store backed by JSON snapshots.
//!
//! One snapshot file per collection under `<root>/collections/`. The store is
//! owned by a single worker task; methods take `&mut self` and are never
//! entered concurrently.

use embranch_domain::{CollectionName, Document, DocumentId, canonicalize_json};
use embranch_ports::{
    CollectionInfo, DocumentInput, EmbeddingPort, QueryMatch, WhereDocumentFilter, WhereFilter,
};
use embranch_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 2;
/// Configuration `_type` tag expected by current readers.
pub const COLLECTION_CONFIG_TYPE: &str = "collection_configuration";
/// Directory under the store root holding collection snapshots.
pub const COLLECTIONS_DIR: &str = "collections";

/// Collection configuration row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Discriminator injected by the legacy migration shim.
    #[serde(rename = "_type")]
    pub config_type: String,
    /// Collection name (mirrors the file name).
    pub name: String,
    /// Collection-level metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Tag naming the embedding function used for this collection.
    pub embedding_function_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SnapshotDocument {
    id: String,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Value>,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CollectionSnapshot {
    version: u32,
    config: CollectionConfig,
    documents: Vec<SnapshotDocument>,
}

#[derive(Debug, Clone)]
struct StoredDocument {
    content: String,
    metadata: Option<Value>,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
struct CollectionState {
    config: CollectionConfig,
    documents: BTreeMap<DocumentId, StoredDocument>,
}

/// Embedded vector store runtime.
pub struct LocalStore {
    store_root: PathBuf,
    embedding: Arc<dyn EmbeddingPort>,
    collections: BTreeMap<CollectionName, CollectionState>,
}

impl LocalStore {
    /// Open the store, running the legacy `_type` migration first and
    /// loading every collection snapshot into memory.
    pub fn open(store_root: PathBuf, embedding: Arc<dyn EmbeddingPort>) -> Result<Self> {
        let collections_dir = store_root.join(COLLECTIONS_DIR);
        std::fs::create_dir_all(&collections_dir)?;
        crate::store::migrate::migrate_legacy_collections(&collections_dir)?;

        let mut collections = BTreeMap::new();
        for entry in std::fs::read_dir(&collections_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let snapshot = read_snapshot(&path)?;
            let name = CollectionName::parse(&snapshot.config.name)
                .map_err(|error| corrupt_snapshot(&path, &error.to_string()))?;
            collections.insert(name, state_from_snapshot(snapshot));
        }

        Ok(Self {
            store_root,
            embedding,
            collections,
        })
    }

    /// List collections, optionally windowed.
    pub fn list_collections(
        &self,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Vec<CollectionInfo> {
        let offset = offset.unwrap_or(0) as usize;
        let limit = limit.map_or(usize::MAX, |limit| limit as usize);
        self.collections
            .iter()
            .skip(offset)
            .take(limit)
            .map(|(name, state)| CollectionInfo {
                name: name.clone(),
                metadata: state.config.metadata.clone(),
                embedding_function_name: state.config.embedding_function_name.clone(),
            })
            .collect()
    }

    /// Create a collection; the name must be unused.
    pub fn create_collection(
        &mut self,
        name: &CollectionName,
        metadata: Option<Value>,
    ) -> Result<()> {
        if self.collections.contains_key(name) {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                format!("collection already exists: {name}"),
            )
            .with_action_required("use a different collection name or delete the existing one"));
        }

        let state = CollectionState {
            config: CollectionConfig {
                config_type: COLLECTION_CONFIG_TYPE.to_owned(),
                name: name.as_str().to_owned(),
                metadata,
                embedding_function_name: self.embedding.function_name().to_owned(),
            },
            documents: BTreeMap::new(),
        };
        self.persist(name, &state)?;
        self.collections.insert(name.clone(), state);
        Ok(())
    }

    /// Delete a collection and its snapshot.
    pub fn delete_collection(&mut self, name: &CollectionName) -> Result<()> {
        if self.collections.remove(name).is_none() {
            return Err(collection_missing(name));
        }
        let path = self.snapshot_path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(ErrorEnvelope::from(error)),
        }
    }

    /// Add documents, embedding their content.
    pub async fn add_documents(
        &mut self,
        ctx: &RequestContext,
        name: &CollectionName,
        documents: Vec<DocumentInput>,
        upsert: bool,
    ) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        if !self.collections.contains_key(name) {
            return Err(collection_missing(name));
        }
        if !upsert {
            let state = self.collections.get(name).ok_or_else(|| collection_missing(name))?;
            for doc in &documents {
                if state.documents.contains_key(&doc.id) {
                    return Err(ErrorEnvelope::expected(
                        ErrorCode::invalid_input(),
                        format!("document id already exists: {}", doc.id),
                    )
                    .with_action_required("pass upsert=true to overwrite existing documents"));
                }
            }
        }

        let texts: Vec<String> = documents.iter().map(|doc| doc.content.clone()).collect();
        let vectors = self.embedding.embed_batch(ctx, texts).await?;
        if vectors.len() != documents.len() {
            return Err(ErrorEnvelope::unexpected(
                ErrorCode::internal(),
                "embedding batch returned a mismatched vector count",
                ErrorClass::NonRetriable,
            ));
        }

        let state = self
            .collections
            .get_mut(name)
            .ok_or_else(|| collection_missing(name))?;
        for (doc, vector) in documents.into_iter().zip(vectors) {
            state.documents.insert(
                doc.id,
                StoredDocument {
                    content: doc.content,
                    metadata: doc.metadata,
                    embedding: vector.as_slice().to_vec(),
                },
            );
        }

        let state = state.clone();
        self.persist(name, &state)
    }

    /// Fetch documents by ids and/or filters.
    pub fn get_documents(
        &self,
        name: &CollectionName,
        ids: Option<&[DocumentId]>,
        where_filter: Option<&WhereFilter>,
        where_document: Option<&WhereDocumentFilter>,
    ) -> Result<Vec<Document>> {
        let state = self.collections.get(name).ok_or_else(|| collection_missing(name))?;

        Ok(state
            .documents
            .iter()
            .filter(|(id, stored)| {
                matches_ids(id, ids)
                    && matches_where(stored.metadata.as_ref(), where_filter)
                    && matches_where_document(&stored.content, where_document)
            })
            .map(|(id, stored)| to_document(name, id, stored))
            .collect())
    }

    /// Similarity query: one ranked result list per query text.
    pub async fn query_documents(
        &mut self,
        ctx: &RequestContext,
        name: &CollectionName,
        query_texts: Vec<String>,
        n_results: u32,
        where_filter: Option<&WhereFilter>,
        where_document: Option<&WhereDocumentFilter>,
    ) -> Result<Vec<Vec<QueryMatch>>> {
        if !self.collections.contains_key(name) {
            return Err(collection_missing(name));
        }
        let vectors = self.embedding.embed_batch(ctx, query_texts).await?;

        let state = self.collections.get(name).ok_or_else(|| collection_missing(name))?;
        let candidates: Vec<(&DocumentId, &StoredDocument)> = state
            .documents
            .iter()
            .filter(|(_, stored)| {
                matches_where(stored.metadata.as_ref(), where_filter)
                    && matches_where_document(&stored.content, where_document)
            })
            .collect();

        let mut results = Vec::with_capacity(vectors.len());
        for vector in vectors {
            let mut scored: Vec<QueryMatch> = candidates
                .iter()
                .map(|(id, stored)| QueryMatch {
                    document: to_document(name, id, stored),
                    score: cosine_similarity(vector.as_slice(), &stored.embedding),
                })
                .collect();
            scored.sort_by_key(|matched| std::cmp::Reverse(OrderedFloat(matched.score)));
            scored.truncate(n_results as usize);
            results.push(scored);
        }
        Ok(results)
    }

    /// Update content and/or metadata for existing ids.
    pub async fn update_documents(
        &mut self,
        ctx: &RequestContext,
        name: &CollectionName,
        ids: Vec<DocumentId>,
        contents: Option<Vec<String>>,
        metadatas: Option<Vec<Value>>,
    ) -> Result<()> {
        if let Some(contents) = &contents {
            if contents.len() != ids.len() {
                return Err(length_mismatch("contents", contents.len(), ids.len()));
            }
        }
        if let Some(metadatas) = &metadatas {
            if metadatas.len() != ids.len() {
                return Err(length_mismatch("metadatas", metadatas.len(), ids.len()));
            }
        }

        {
            let state = self.collections.get(name).ok_or_else(|| collection_missing(name))?;
            for id in &ids {
                if !state.documents.contains_key(id) {
                    return Err(document_missing(name, id));
                }
            }
        }

        let new_vectors = match &contents {
            Some(contents) => Some(self.embedding.embed_batch(ctx, contents.clone()).await?),
            None => None,
        };

        let state = self
            .collections
            .get_mut(name)
            .ok_or_else(|| collection_missing(name))?;
        for (index, id) in ids.iter().enumerate() {
            let Some(stored) = state.documents.get_mut(id) else {
                continue;
            };
            if let (Some(contents), Some(vectors)) = (&contents, &new_vectors) {
                if let (Some(content), Some(vector)) = (contents.get(index), vectors.get(index)) {
                    stored.content = content.clone();
                    stored.embedding = vector.as_slice().to_vec();
                }
            }
            if let Some(metadatas) = &metadatas {
                if let Some(metadata) = metadatas.get(index) {
                    stored.metadata = Some(metadata.clone());
                }
            }
        }

        let state = state.clone();
        self.persist(name, &state)
    }

    /// Delete documents by id; unknown ids are ignored.
    pub fn delete_documents(&mut self, name: &CollectionName, ids: &[DocumentId]) -> Result<()> {
        let state = self
            .collections
            .get_mut(name)
            .ok_or_else(|| collection_missing(name))?;
        for id in ids {
            state.documents.remove(id);
        }
        let state = state.clone();
        self.persist(name, &state)
    }

    /// Number of documents in a collection.
    pub fn count(&self, name: &CollectionName) -> Result<u64> {
        let state = self.collections.get(name).ok_or_else(|| collection_missing(name))?;
        Ok(state.documents.len() as u64)
    }

    fn snapshot_path(&self, name: &CollectionName) -> PathBuf {
        self.store_root
            .join(COLLECTIONS_DIR)
            .join(format!("{}.json", name.as_str()))
    }

    fn persist(&self, name: &CollectionName, state: &CollectionState) -> Result<()> {
        let snapshot = CollectionSnapshot {
            version: SNAPSHOT_VERSION,
            config: state.config.clone(),
            documents: state
                .documents
                .iter()
                .map(|(id, stored)| SnapshotDocument {
                    id: id.as_str().to_owned(),
                    content: stored.content.clone(),
                    metadata: stored.metadata.clone(),
                    embedding: stored.embedding.clone(),
                })
                .collect(),
        };

        let path = self.snapshot_path(name);
        let payload = serde_json::to_vec_pretty(&snapshot)?;
        let temp_path = path.with_extension(format!("json.tmp-{}", std::process::id()));
        std::fs::write(&temp_path, payload)?;
        std::fs::rename(&temp_path, &path)?;
        Ok(())
    }
}

fn read_snapshot(path: &Path) -> Result<CollectionSnapshot> {
    let payload = std::fs::read(path)?;
    serde_json::from_slice(&payload)
        .map_err(|error| corrupt_snapshot(path, &error.to_string()))
}

fn state_from_snapshot(snapshot: CollectionSnapshot) -> CollectionState {
    let documents = snapshot
        .documents
        .into_iter()
        .filter_map(|doc| {
            let id = DocumentId::parse(&doc.id).ok()?;
            Some((
                id,
                StoredDocument {
                    content: doc.content,
                    metadata: doc.metadata,
                    embedding: doc.embedding,
                },
            ))
        })
        .collect();
    CollectionState {
        config: snapshot.config,
        documents,
    }
}

fn to_document(name: &CollectionName, id: &DocumentId, stored: &StoredDocument) -> Document {
    Document {
        id: id.clone(),
        collection: name.clone(),
        content: stored.content.clone(),
        metadata: stored.metadata.clone(),
    }
}

fn matches_ids(id: &DocumentId, ids: Option<&[DocumentId]>) -> bool {
    ids.is_none_or(|ids| ids.contains(id))
}

/// Metadata filter: every key in the filter object must equal the
/// corresponding metadata value (scalar or canonicalized JSON equality).
fn matches_where(metadata: Option<&Value>, filter: Option<&WhereFilter>) -> bool {
    let Some(filter) = filter else { return true };
    let Some(constraints) = filter.as_object() else {
        return false;
    };
    if constraints.is_empty() {
        return true;
    }
    let Some(metadata) = metadata.and_then(Value::as_object) else {
        return false;
    };

    constraints.iter().all(|(key, expected)| {
        metadata
            .get(key)
            .is_some_and(|actual| canonicalize_json(actual) == canonicalize_json(expected))
    })
}

/// Document filter: `{"$contains": "text"}` substring match.
fn matches_where_document(content: &str, filter: Option<&WhereDocumentFilter>) -> bool {
    let Some(filter) = filter else { return true };
    match filter.get("$contains").and_then(Value::as_str) {
        Some(needle) => content.contains(needle),
        None => true,
    }
}

/// Cosine similarity; zero-magnitude vectors score 0.
fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    if left.len() != right.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_left = 0.0f32;
    let mut norm_right = 0.0f32;
    for (a, b) in left.iter().zip(right.iter()) {
        dot += a * b;
        norm_left += a * a;
        norm_right += b * b;
    }
    let denominator = norm_left.sqrt() * norm_right.sqrt();
    if denominator == 0.0 { 0.0 } else { dot / denominator }
}

fn collection_missing(name: &CollectionName) -> ErrorEnvelope {
    ErrorEnvelope::expected(
        ErrorCode::not_found(),
        format!("collection not found: {name}"),
    )
    .with_action_required("create the collection first")
}

fn document_missing(name: &CollectionName, id: &DocumentId) -> ErrorEnvelope {
    ErrorEnvelope::expected(
        ErrorCode::not_found(),
        format!("document not found: {name}/{id}"),
    )
}

fn length_mismatch(field: &str, actual: usize, expected: usize) -> ErrorEnvelope {
    ErrorEnvelope::expected(
        ErrorCode::invalid_input(),
        format!("{field} length {actual} does not match ids length {expected}"),
    )
}

fn corrupt_snapshot(path: &Path, detail: &str) -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::corrupt(),
        format!("collection snapshot unreadable: {detail}"),
        ErrorClass::NonRetriable,
    )
    .with_metadata("path", path.display().to_string())
}
