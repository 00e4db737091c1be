//! `embranch status`: repository and sync status.

use super::{build_state, print_json};
use embranch_facade::RequestContext;

/// Report repository availability, branch/head, and sync state.
pub async fn run() -> anyhow::Result<()> {
    let state = build_state().await?;
    let ctx = RequestContext::new_request();

    let repository = embranch_facade::repository_status(&state, &ctx).await;
    let sync = embranch_facade::sync_status(&state, &ctx).await;

    print_json(&serde_json::json!({
        "repository": repository,
        "sync": sync,
    }))?;

    state.shutdown().await;
    Ok(())
}
