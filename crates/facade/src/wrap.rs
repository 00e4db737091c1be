//! Response wrapping: envelopes and out-of-sync warnings.

use embranch_api::v1::{DmmsWarning, ToolResponse, envelope_to_tool_error};
use embranch_infra::ServerState;
use embranch_shared::{RequestContext, Result};
use serde::Serialize;

/// Turn a use-case result into a tool response envelope.
pub fn respond<T: Serialize>(result: Result<T>) -> ToolResponse {
    match result {
        Ok(payload) => ToolResponse::ok(&payload),
        Err(envelope) => ToolResponse::err(envelope_to_tool_error(&envelope)),
    }
}

/// Attach an out-of-sync warning to a mutating tool response.
///
/// Read-only tools skip this. A failing warning check never fails the tool;
/// the response goes out unwarned instead.
pub async fn attach_warning(
    state: &ServerState,
    ctx: &RequestContext,
    response: ToolResponse,
) -> ToolResponse {
    if !state.config.manifest.use_manifest {
        return response;
    }

    let _guard = state.lock_reads().await;
    let warning = match state.checker.check(ctx).await {
        Ok(check) if !check.in_sync => Some(DmmsWarning::from_check(&check)),
        Ok(_) | Err(_) => None,
    };
    response.with_warning(warning)
}
