//! Facade tests: envelopes and warning attachment, no `dolt` binary needed.

use embranch_config::EmbranchConfig;
use embranch_domain::InitMode;
use embranch_facade::api::{
    AddDocumentItem, AddDocumentsRequest, CreateCollectionRequest, ListCollectionsRequest,
    QueryDocumentsRequest,
};
use embranch_facade::{RequestContext, ServerState};
use embranch_ports::ManifestPort;
use std::path::PathBuf;
use std::sync::Arc;

fn scratch_root(tag: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!(
        "embranch-facade-it-{tag}-{}",
        std::process::id()
    ));
    std::fs::remove_dir_all(&root).ok();
    std::fs::create_dir_all(&root).expect("mkdir");
    root
}

async fn build_state(tag: &str, use_manifest: bool) -> (Arc<ServerState>, PathBuf) {
    let root = scratch_root(tag);
    let mut config = EmbranchConfig::default();
    config.manifest.use_manifest = use_manifest;
    config.logging.enabled = false;
    // A non-existent executable: driver calls that spawn will fail, but
    // initialization checks only look at the filesystem.
    config.dolt.executable_path = PathBuf::from("/nonexistent/dolt");
    let state = ServerState::build(config, root.clone()).await.expect("build state");
    (state, root)
}

#[tokio::test]
async fn collection_tools_round_trip() {
    let (state, root) = build_state("roundtrip", false).await;
    let ctx = RequestContext::new_request();

    let created = embranch_facade::create_collection(
        &state,
        &ctx,
        CreateCollectionRequest {
            name: "notes".to_owned(),
            metadata: None,
        },
    )
    .await;
    assert!(created.success, "create failed: {created:?}");

    let added = embranch_facade::add_documents(
        &state,
        &ctx,
        AddDocumentsRequest {
            collection: "notes".to_owned(),
            documents: vec![AddDocumentItem {
                id: "d1".to_owned(),
                content: "searchable text".to_owned(),
                metadata: None,
            }],
            upsert: false,
        },
    )
    .await;
    assert!(added.success, "add failed: {added:?}");

    let listed = embranch_facade::list_collections(
        &state,
        &ctx,
        ListCollectionsRequest::default(),
    )
    .await;
    assert!(listed.success);
    let names: Vec<String> = listed
        .result
        .as_ref()
        .and_then(|value| value.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("name").and_then(|name| name.as_str()))
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();
    assert_eq!(names, vec!["notes".to_owned()]);

    let queried = embranch_facade::query_documents(
        &state,
        &ctx,
        QueryDocumentsRequest {
            collection: "notes".to_owned(),
            query_texts: vec!["searchable".to_owned()],
            n_results: None,
            where_filter: None,
            where_document: None,
        },
    )
    .await;
    assert!(queried.success);

    state.shutdown().await;
    std::fs::remove_dir_all(&root).ok();
}

#[tokio::test]
async fn invalid_arguments_produce_stable_error_tags() {
    let (state, root) = build_state("badargs", false).await;
    let ctx = RequestContext::new_request();

    let response = embranch_facade::create_collection(
        &state,
        &ctx,
        CreateCollectionRequest {
            name: "bad name".to_owned(),
            metadata: None,
        },
    )
    .await;
    assert!(!response.success);
    let error = response.error.expect("error payload");
    assert_eq!(error.error, "DOMAIN_INVALID_COLLECTION_NAME");

    state.shutdown().await;
    std::fs::remove_dir_all(&root).ok();
}

#[tokio::test]
async fn mutating_tools_carry_out_of_sync_warning() {
    let (state, root) = build_state("warned", true).await;
    let ctx = RequestContext::new_request();

    // A manifest exists but no local repository does: clearly out of sync.
    state
        .manifest
        .create_default(None, None, InitMode::Manual)
        .expect("manifest");

    let mutating = embranch_facade::create_collection(
        &state,
        &ctx,
        CreateCollectionRequest {
            name: "notes".to_owned(),
            metadata: None,
        },
    )
    .await;
    assert!(mutating.success);
    let warning = mutating.dmms_warning.expect("warning expected");
    assert_eq!(warning.kind, "out_of_sync");
    assert!(!warning.action_required.is_empty());

    // Read-only tools never carry the warning.
    let read_only = embranch_facade::list_collections(
        &state,
        &ctx,
        ListCollectionsRequest::default(),
    )
    .await;
    assert!(read_only.success);
    assert!(read_only.dmms_warning.is_none());

    state.shutdown().await;
    std::fs::remove_dir_all(&root).ok();
}

#[tokio::test]
async fn warning_is_suppressed_when_manifest_mode_is_off() {
    let (state, root) = build_state("unwarned", false).await;
    let ctx = RequestContext::new_request();

    let response = embranch_facade::create_collection(
        &state,
        &ctx,
        CreateCollectionRequest {
            name: "notes".to_owned(),
            metadata: None,
        },
    )
    .await;
    assert!(response.success);
    assert!(response.dmms_warning.is_none());

    state.shutdown().await;
    std::fs::remove_dir_all(&root).ok();
}
