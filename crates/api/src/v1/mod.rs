//! Tool-surface DTOs and helpers, version 1.

mod mappers;
mod types;

pub use mappers::{envelope_to_tool_error, error_tag};
pub use types::*;
