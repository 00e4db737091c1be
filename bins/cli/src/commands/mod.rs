//! CLI subcommands.

pub mod config;
pub mod init;
pub mod serve;
pub mod status;

use embranch_facade::ServerState;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Collect the process environment as a map.
#[must_use]
pub fn environ() -> BTreeMap<String, String> {
    std::env::vars().collect()
}

/// Build server state from the environment, bootstrapping logging.
pub async fn build_state() -> anyhow::Result<Arc<ServerState>> {
    let environ = environ();
    let cwd = std::env::current_dir()?;
    let (state, ignored) = ServerState::from_env(&environ, &cwd)
        .await
        .map_err(|error| anyhow::anyhow!("{error}"))?;

    embranch_facade::init_logging(
        &state.config.logging,
        &state.config.data_path(&state.project_root),
    )
    .map_err(|error| anyhow::anyhow!("{error}"))?;

    for name in ignored {
        tracing::warn!(env_var = %name, "removed variable present in environment; ignored");
    }
    Ok(state)
}

/// Print a serializable value as a pretty JSON line.
pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
