//! Logging bootstrap from configuration.

use embranch_config::LoggingConfig;
use embranch_shared::{ErrorEnvelope, Result};
use std::fs::OpenOptions;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber per configuration.
///
/// With `file_name` set, events go to `<data_path>/<file_name>` as JSON
/// lines; otherwise to stderr. Calling twice is a no-op.
pub fn init_logging(config: &LoggingConfig, data_path: &Path) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = EnvFilter::try_new(&config.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(file_name) = &config.file_name {
        std::fs::create_dir_all(data_path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(data_path.join(file_name))
            .map_err(ErrorEnvelope::from)?;
        let _ = tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(file)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    Ok(())
}
