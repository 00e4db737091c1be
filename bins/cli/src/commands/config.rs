//! `embranch config`: print the effective configuration.

use super::{environ, print_json};
use embranch_config::{load_from_env, resolve_project_root};

/// Load the configuration from the environment and print it.
pub fn run(json: bool) -> anyhow::Result<()> {
    let loaded = load_from_env(&environ()).map_err(|error| anyhow::anyhow!("{error}"))?;
    let cwd = std::env::current_dir()?;
    let project_root = resolve_project_root(&loaded.config, &cwd);

    if json {
        let payload = serde_json::json!({
            "config": loaded.config,
            "project_root": project_root,
            "ignored_vars": loaded.ignored_vars,
        });
        print_json(&payload)?;
    } else {
        println!("project root: {}", project_root.display());
        println!(
            "dolt executable: {}",
            loaded.config.dolt.executable_path.display()
        );
        println!("remote name: {}", loaded.config.dolt.remote_name);
        println!(
            "manifest: {} ({})",
            loaded.config.manifest.use_manifest, loaded.config.manifest.init_mode
        );
        for name in &loaded.ignored_vars {
            println!("ignored: {name}");
        }
    }
    Ok(())
}
