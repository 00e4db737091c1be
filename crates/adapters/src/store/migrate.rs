//! One-shot migration for legacy collection snapshots.
//!
//! Databases written before the configuration `_type` discriminator existed
//! carry config rows without it. On first open we inject the field into each
//! collection's configuration before any client call. The migration is
//! idempotent and leaves current-format databases untouched.

use crate::store::local::COLLECTION_CONFIG_TYPE;
use embranch_shared::{ErrorClass, ErrorCode, ErrorEnvelope, Result};
use serde_json::Value;
use std::path::Path;

/// Inject the missing `_type` field into legacy collection configurations.
///
/// Returns the number of files migrated.
pub fn migrate_legacy_collections(collections_dir: &Path) -> Result<u32> {
    if !collections_dir.is_dir() {
        return Ok(0);
    }

    let mut migrated = 0u32;
    for entry in std::fs::read_dir(collections_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        if migrate_file(&path)? {
            migrated = migrated.saturating_add(1);
        }
    }
    Ok(migrated)
}

fn migrate_file(path: &Path) -> Result<bool> {
    let payload = std::fs::read_to_string(path)?;
    let mut value: Value = serde_json::from_str(&payload).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::corrupt(),
            format!("collection snapshot unreadable during migration: {error}"),
            ErrorClass::NonRetriable,
        )
        .with_metadata("path", path.display().to_string())
    })?;

    let Some(config) = value.get_mut("config").and_then(Value::as_object_mut) else {
        // Not a snapshot we understand; leave it alone.
        return Ok(false);
    };

    if config.contains_key("_type") {
        return Ok(false);
    }

    config.insert(
        "_type".to_owned(),
        Value::String(COLLECTION_CONFIG_TYPE.to_owned()),
    );

    let serialized = serde_json::to_vec_pretty(&value)?;
    let temp_path = path.with_extension(format!("json.tmp-{}", std::process::id()));
    std::fs::write(&temp_path, serialized)?;
    std::fs::rename(&temp_path, path)?;
    Ok(true)
}
