//! Document tools.

use crate::wrap::{attach_warning, respond};
use embranch_api::v1::{
    AddDocumentsRequest, DeleteDocumentsRequest, DocumentDto, GetDocumentsRequest,
    QueryDocumentsRequest, QueryMatchDto, ToolResponse, UpdateDocumentsRequest,
};
use embranch_domain::{CollectionName, Document, DocumentId};
use embranch_infra::ServerState;
use embranch_ports::DocumentInput;
use embranch_shared::{ErrorEnvelope, RequestContext, Result};

const DEFAULT_QUERY_RESULTS: u32 = 5;

fn parse_collection(name: &str) -> Result<CollectionName> {
    CollectionName::parse(name).map_err(ErrorEnvelope::from)
}

fn parse_ids(ids: &[String]) -> Result<Vec<DocumentId>> {
    ids.iter()
        .map(|id| DocumentId::parse(id).map_err(ErrorEnvelope::from))
        .collect()
}

fn to_dto(document: Document) -> DocumentDto {
    DocumentDto {
        id: document.id.as_str().to_owned(),
        collection: document.collection.as_str().to_owned(),
        content: document.content,
        metadata: document.metadata,
    }
}

/// Add documents to a collection (mutating).
pub async fn add_documents(
    state: &ServerState,
    ctx: &RequestContext,
    request: AddDocumentsRequest,
) -> ToolResponse {
    let result: Result<serde_json::Value> = async {
        let name = parse_collection(&request.collection)?;
        let documents: Vec<DocumentInput> = request
            .documents
            .into_iter()
            .map(|item| {
                Ok(DocumentInput {
                    id: DocumentId::parse(&item.id).map_err(ErrorEnvelope::from)?,
                    content: item.content,
                    metadata: item.metadata,
                })
            })
            .collect::<Result<_>>()?;
        let count = documents.len();
        state
            .store
            .add_documents(ctx, name, documents, request.upsert)
            .await?;
        Ok(serde_json::json!({"added": count}))
    }
    .await;
    attach_warning(state, ctx, respond(result)).await
}

/// Fetch documents by ids and/or filters (read-only).
pub async fn get_documents(
    state: &ServerState,
    ctx: &RequestContext,
    request: GetDocumentsRequest,
) -> ToolResponse {
    let result: Result<Vec<DocumentDto>> = async {
        let name = parse_collection(&request.collection)?;
        let ids = match &request.ids {
            Some(ids) => Some(parse_ids(ids)?),
            None => None,
        };
        let documents = state
            .store
            .get_documents(ctx, name, ids, request.where_filter, request.where_document)
            .await?;
        Ok(documents.into_iter().map(to_dto).collect())
    }
    .await;
    respond(result)
}

/// Similarity query (read-only).
pub async fn query_documents(
    state: &ServerState,
    ctx: &RequestContext,
    request: QueryDocumentsRequest,
) -> ToolResponse {
    let result: Result<Vec<Vec<QueryMatchDto>>> = async {
        let name = parse_collection(&request.collection)?;
        let n_results = request.n_results.unwrap_or(DEFAULT_QUERY_RESULTS).max(1);
        let matches = state
            .store
            .query_documents(
                ctx,
                name,
                request.query_texts,
                n_results,
                request.where_filter,
                request.where_document,
            )
            .await?;
        Ok(matches
            .into_iter()
            .map(|ranked| {
                ranked
                    .into_iter()
                    .map(|matched| QueryMatchDto {
                        document: to_dto(matched.document),
                        score: matched.score,
                    })
                    .collect()
            })
            .collect())
    }
    .await;
    respond(result)
}

/// Update documents in place (mutating).
pub async fn update_documents(
    state: &ServerState,
    ctx: &RequestContext,
    request: UpdateDocumentsRequest,
) -> ToolResponse {
    let result: Result<serde_json::Value> = async {
        let name = parse_collection(&request.collection)?;
        let ids = parse_ids(&request.ids)?;
        let count = ids.len();
        state
            .store
            .update_documents(ctx, name, ids, request.contents, request.metadatas)
            .await?;
        Ok(serde_json::json!({"updated": count}))
    }
    .await;
    attach_warning(state, ctx, respond(result)).await
}

/// Delete documents by id (mutating).
pub async fn delete_documents(
    state: &ServerState,
    ctx: &RequestContext,
    request: DeleteDocumentsRequest,
) -> ToolResponse {
    let result: Result<serde_json::Value> = async {
        let name = parse_collection(&request.collection)?;
        let ids = parse_ids(&request.ids)?;
        let count = ids.len();
        state.store.delete_documents(ctx, name, ids).await?;
        Ok(serde_json::json!({"deleted": count}))
    }
    .await;
    attach_warning(state, ctx, respond(result)).await
}

/// Count documents in a collection (read-only).
pub async fn get_collection_count(
    state: &ServerState,
    ctx: &RequestContext,
    collection: &str,
) -> ToolResponse {
    let result: Result<serde_json::Value> = async {
        let name = parse_collection(collection)?;
        let count = state.store.count(ctx, name).await?;
        Ok(serde_json::json!({"count": count}))
    }
    .await;
    respond(result)
}
