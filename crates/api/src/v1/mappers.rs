//! Mapping from shared error envelopes to tool-surface DTOs.

use crate::v1::types::ToolError;
use embranch_shared::{ErrorCode, ErrorEnvelope};

/// Stable tool-surface tag for an error code.
#[must_use]
pub fn error_tag(code: &ErrorCode) -> String {
    let known = [
        (ErrorCode::not_initialized(), "NOT_INITIALIZED"),
        (ErrorCode::already_initialized(), "ALREADY_INITIALIZED"),
        (ErrorCode::invalid_input(), "INVALID_ARGUMENT"),
        (ErrorCode::not_found(), "NOT_FOUND"),
        (ErrorCode::conflict(), "CONFLICT"),
        (ErrorCode::busy(), "BUSY"),
        (ErrorCode::timeout(), "TIMED_OUT"),
        (ErrorCode::network(), "NETWORK_ERROR"),
        (ErrorCode::auth_failed(), "AUTH_FAILED"),
        (ErrorCode::permission_denied(), "PERMISSION_DENIED"),
        (ErrorCode::rejected(), "REMOTE_REJECTED"),
        (ErrorCode::repository_not_found(), "REPOSITORY_NOT_FOUND"),
        (ErrorCode::schema_missing(), "SCHEMA_MISSING"),
        (ErrorCode::corrupt(), "CORRUPT"),
        (ErrorCode::cancelled(), "CANCELLED"),
    ];
    for (candidate, tag) in known {
        if *code == candidate {
            return (*tag).to_owned();
        }
    }
    format!(
        "{}_{}",
        code.namespace().to_ascii_uppercase(),
        code.code().to_ascii_uppercase()
    )
}

/// Convert an error envelope into a tool error payload.
#[must_use]
pub fn envelope_to_tool_error(envelope: &ErrorEnvelope) -> ToolError {
    let mut suggestions = Vec::new();
    if let Some(action) = envelope.action_required() {
        suggestions.push(action.to_owned());
    }
    if envelope.code == ErrorCode::rejected() {
        suggestions.push("Inspect remote history with dolt_log before retrying".to_owned());
    }

    ToolError {
        error: error_tag(&envelope.code),
        message: envelope.message.clone(),
        suggestions,
    }
}
