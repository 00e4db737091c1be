//! `embranch init`: run the startup initializer once.

use super::{build_state, print_json};
use embranch_facade::RequestContext;

/// Run the manifest-driven initializer and report the outcome.
pub async fn run() -> anyhow::Result<()> {
    let state = build_state().await?;
    let ctx = RequestContext::new_request();

    match state.run_initializer(&ctx).await {
        Ok(output) => {
            print_json(&serde_json::json!({
                "success": true,
                "status": output.status,
                "check": output.check,
            }))?;
        },
        Err(error) => {
            print_json(&serde_json::json!({
                "success": false,
                "error": error.code.to_string(),
                "message": error.message,
                "action_required": error.action_required(),
            }))?;
        },
    }

    state.shutdown().await;
    Ok(())
}
