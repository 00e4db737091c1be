//! Vector store boundary contract.
//!
//! All implementations serialize calls onto a single cooperative worker;
//! results are plain data and never leak runtime objects.

use crate::BoxFuture;
use embranch_domain::{CollectionName, Document, DocumentId};
use embranch_shared::{RequestContext, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Collection descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Unique collection name.
    pub name: CollectionName,
    /// Collection-level metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Tag naming the embedding function used for this collection.
    pub embedding_function_name: String,
}

/// A document payload for insertion or upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInput {
    /// Document identifier, unique within the collection.
    pub id: DocumentId,
    /// Text content.
    pub content: String,
    /// Optional JSON-object metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// A single similarity match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    /// Matched document.
    pub document: Document,
    /// Cosine similarity score (higher is closer).
    pub score: f32,
}

/// Metadata filter: a JSON object of per-key scalar equality constraints.
pub type WhereFilter = Value;

/// Document filter: `{"$contains": "text"}` substring constraint.
pub type WhereDocumentFilter = Value;

/// Boundary contract for the vector store gateway.
pub trait VectorStorePort: Send + Sync {
    /// List collections, optionally windowed.
    fn list_collections(
        &self,
        ctx: &RequestContext,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> BoxFuture<'_, Result<Vec<CollectionInfo>>>;

    /// Create a collection; fails when the name already exists.
    fn create_collection(
        &self,
        ctx: &RequestContext,
        name: CollectionName,
        metadata: Option<Value>,
    ) -> BoxFuture<'_, Result<()>>;

    /// Delete a collection and all of its documents.
    fn delete_collection(
        &self,
        ctx: &RequestContext,
        name: CollectionName,
    ) -> BoxFuture<'_, Result<()>>;

    /// Add documents; with `upsert` existing ids are overwritten, without it
    /// a duplicate id is an error.
    fn add_documents(
        &self,
        ctx: &RequestContext,
        name: CollectionName,
        documents: Vec<DocumentInput>,
        upsert: bool,
    ) -> BoxFuture<'_, Result<()>>;

    /// Fetch documents by ids and/or filters.
    fn get_documents(
        &self,
        ctx: &RequestContext,
        name: CollectionName,
        ids: Option<Vec<DocumentId>>,
        where_filter: Option<WhereFilter>,
        where_document: Option<WhereDocumentFilter>,
    ) -> BoxFuture<'_, Result<Vec<Document>>>;

    /// Similarity query: one result list per query text.
    fn query_documents(
        &self,
        ctx: &RequestContext,
        name: CollectionName,
        query_texts: Vec<String>,
        n_results: u32,
        where_filter: Option<WhereFilter>,
        where_document: Option<WhereDocumentFilter>,
    ) -> BoxFuture<'_, Result<Vec<Vec<QueryMatch>>>>;

    /// Update content and/or metadata for existing ids.
    fn update_documents(
        &self,
        ctx: &RequestContext,
        name: CollectionName,
        ids: Vec<DocumentId>,
        contents: Option<Vec<String>>,
        metadatas: Option<Vec<Value>>,
    ) -> BoxFuture<'_, Result<()>>;

    /// Delete documents by id.
    fn delete_documents(
        &self,
        ctx: &RequestContext,
        name: CollectionName,
        ids: Vec<DocumentId>,
    ) -> BoxFuture<'_, Result<()>>;

    /// Number of documents in a collection.
    fn count(&self, ctx: &RequestContext, name: CollectionName) -> BoxFuture<'_, Result<u64>>;
}
