//! `embranch serve`: line-delimited JSON tool dispatch over stdio.
//!
//! One request object per line: `{"tool": "...", "arguments": {...}}`.
//! One response envelope per line. The MCP wire framing proper lives in the
//! host process; this loop is the collaborator seam.

use super::build_state;
use embranch_facade::api::{
    AddDocumentsRequest, CheckoutRequest, CloneRequest, CreateCollectionRequest,
    DeleteCollectionRequest, DeleteDocumentsRequest, GetDocumentsRequest, ListCollectionsRequest,
    PullRequest, PushRequest, QueryDocumentsRequest, SetRemoteRequest, ToolError, ToolResponse,
    UpdateDocumentsRequest,
};
use embranch_facade::{RequestContext, ServerState};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Debug, Deserialize)]
struct ToolCall {
    tool: String,
    #[serde(default)]
    arguments: Value,
}

/// Read tool calls from stdin until EOF.
pub async fn run() -> anyhow::Result<()> {
    let state = build_state().await?;

    let ctx = RequestContext::new_request();
    match state.run_initializer(&ctx).await {
        Ok(output) => tracing::info!(status = ?output.status, "initializer finished"),
        Err(error) => tracing::warn!(%error, "initializer failed; tools remain available"),
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<ToolCall>(trimmed) {
            Ok(call) => dispatch(&state, call).await,
            Err(error) => ToolResponse::err(ToolError {
                error: "INVALID_REQUEST".to_owned(),
                message: format!("unparseable tool call: {error}"),
                suggestions: vec![
                    "send one JSON object per line: {\"tool\": ..., \"arguments\": ...}"
                        .to_owned(),
                ],
            }),
        };
        let mut payload = serde_json::to_string(&response)?;
        payload.push('\n');
        stdout.write_all(payload.as_bytes()).await?;
        stdout.flush().await?;
    }

    state.shutdown().await;
    Ok(())
}

async fn dispatch(state: &ServerState, call: ToolCall) -> ToolResponse {
    let ctx = RequestContext::new_request();

    match call.tool.as_str() {
        "list_collections" => match parse::<ListCollectionsRequest>(call.arguments) {
            Ok(request) => embranch_facade::list_collections(state, &ctx, request).await,
            Err(error) => error,
        },
        "create_collection" => match parse::<CreateCollectionRequest>(call.arguments) {
            Ok(request) => embranch_facade::create_collection(state, &ctx, request).await,
            Err(error) => error,
        },
        "delete_collection" => match parse::<DeleteCollectionRequest>(call.arguments) {
            Ok(request) => embranch_facade::delete_collection(state, &ctx, request).await,
            Err(error) => error,
        },
        "add_documents" => match parse::<AddDocumentsRequest>(call.arguments) {
            Ok(request) => embranch_facade::add_documents(state, &ctx, request).await,
            Err(error) => error,
        },
        "get_documents" => match parse::<GetDocumentsRequest>(call.arguments) {
            Ok(request) => embranch_facade::get_documents(state, &ctx, request).await,
            Err(error) => error,
        },
        "query_documents" => match parse::<QueryDocumentsRequest>(call.arguments) {
            Ok(request) => embranch_facade::query_documents(state, &ctx, request).await,
            Err(error) => error,
        },
        "update_documents" => match parse::<UpdateDocumentsRequest>(call.arguments) {
            Ok(request) => embranch_facade::update_documents(state, &ctx, request).await,
            Err(error) => error,
        },
        "delete_documents" => match parse::<DeleteDocumentsRequest>(call.arguments) {
            Ok(request) => embranch_facade::delete_documents(state, &ctx, request).await,
            Err(error) => error,
        },
        "get_collection_count" => {
            let collection = call
                .arguments
                .get("collection")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            embranch_facade::get_collection_count(state, &ctx, &collection).await
        },
        "push" => match parse::<PushRequest>(call.arguments) {
            Ok(request) => embranch_facade::push(state, &ctx, request).await,
            Err(error) => error,
        },
        "pull" => match parse::<PullRequest>(call.arguments) {
            Ok(request) => embranch_facade::pull(state, &ctx, request).await,
            Err(error) => error,
        },
        "checkout" => match parse::<CheckoutRequest>(call.arguments) {
            Ok(request) => embranch_facade::checkout(state, &ctx, request).await,
            Err(error) => error,
        },
        "set_remote" => match parse::<SetRemoteRequest>(call.arguments) {
            Ok(request) => embranch_facade::set_remote(state, &ctx, request).await,
            Err(error) => error,
        },
        "clone" => match parse::<CloneRequest>(call.arguments) {
            Ok(request) => embranch_facade::clone_repository(state, &ctx, request).await,
            Err(error) => error,
        },
        "sync_status" => embranch_facade::sync_status(state, &ctx).await,
        "repository_status" => embranch_facade::repository_status(state, &ctx).await,
        "history" => {
            let limit = call
                .arguments
                .get("limit")
                .and_then(Value::as_u64)
                .map_or(20, |value| value as u32);
            embranch_facade::history(state, &ctx, limit).await
        },
        other => ToolResponse::err(ToolError {
            error: "UNKNOWN_TOOL".to_owned(),
            message: format!("no such tool: {other}"),
            suggestions: vec!["call list_collections, push, pull, checkout, ...".to_owned()],
        }),
    }
}

fn parse<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T, ToolResponse> {
    serde_json::from_value(arguments).map_err(|error| {
        ToolResponse::err(ToolError {
            error: "INVALID_ARGUMENT".to_owned(),
            message: format!("invalid tool arguments: {error}"),
            suggestions: Vec::new(),
        })
    })
}
