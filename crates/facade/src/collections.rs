//! Collection tools.

use crate::wrap::{attach_warning, respond};
use embranch_api::v1::{
    CollectionDto, CreateCollectionRequest, DeleteCollectionRequest, ListCollectionsRequest,
    ToolResponse,
};
use embranch_domain::CollectionName;
use embranch_infra::ServerState;
use embranch_shared::{ErrorEnvelope, RequestContext, Result};

/// List collections (read-only).
pub async fn list_collections(
    state: &ServerState,
    ctx: &RequestContext,
    request: ListCollectionsRequest,
) -> ToolResponse {
    let result: Result<Vec<CollectionDto>> = async {
        let collections = state
            .store
            .list_collections(ctx, request.limit, request.offset)
            .await?;
        Ok(collections
            .into_iter()
            .map(|info| CollectionDto {
                name: info.name.as_str().to_owned(),
                metadata: info.metadata,
                embedding_function_name: info.embedding_function_name,
            })
            .collect())
    }
    .await;
    respond(result)
}

/// Create a collection (mutating).
pub async fn create_collection(
    state: &ServerState,
    ctx: &RequestContext,
    request: CreateCollectionRequest,
) -> ToolResponse {
    let result: Result<serde_json::Value> = async {
        let name = CollectionName::parse(&request.name).map_err(ErrorEnvelope::from)?;
        state
            .store
            .create_collection(ctx, name.clone(), request.metadata.clone())
            .await?;
        Ok(serde_json::json!({"created": name.as_str()}))
    }
    .await;
    attach_warning(state, ctx, respond(result)).await
}

/// Delete a collection and its documents (mutating).
pub async fn delete_collection(
    state: &ServerState,
    ctx: &RequestContext,
    request: DeleteCollectionRequest,
) -> ToolResponse {
    let result: Result<serde_json::Value> = async {
        let name = CollectionName::parse(&request.name).map_err(ErrorEnvelope::from)?;
        state.store.delete_collection(ctx, name).await?;
        Ok(serde_json::json!({"deleted": request.name}))
    }
    .await;
    attach_warning(state, ctx, respond(result)).await
}
