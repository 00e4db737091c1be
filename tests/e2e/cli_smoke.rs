//! CLI smoke tests; none of these require a `dolt` binary.

use std::io;
use std::process::Command;

fn scratch_root(tag: &str) -> std::path::PathBuf {
    let root = std::env::temp_dir().join(format!(
        "embranch-cli-e2e-{tag}-{}",
        std::process::id()
    ));
    std::fs::remove_dir_all(&root).ok();
    std::fs::create_dir_all(&root).expect("mkdir");
    root
}

#[test]
fn help_prints_subcommands() -> io::Result<()> {
    let output = Command::new(env!("CARGO_BIN_EXE_embranch"))
        .arg("--help")
        .output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for subcommand in ["config", "status", "init", "serve"] {
        assert!(stdout.contains(subcommand), "missing {subcommand}");
    }
    Ok(())
}

#[test]
fn config_json_reports_defaults() -> io::Result<()> {
    let root = scratch_root("config");
    let output = Command::new(env!("CARGO_BIN_EXE_embranch"))
        .args(["config", "--json"])
        .env_remove("DOLT_REMOTE_URL")
        .env_remove("DOLT_COMMAND_TIMEOUT")
        .env("DMMS_PROJECT_ROOT", &root)
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(io::Error::other(format!("config failed: {stderr}")));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(stdout.trim()).map_err(io::Error::other)?;
    assert_eq!(
        value.pointer("/config/dolt/remoteName").and_then(|v| v.as_str()),
        Some("origin")
    );
    assert_eq!(
        value
            .pointer("/config/dolt/commandTimeoutSecs")
            .and_then(|v| v.as_u64()),
        Some(60)
    );
    assert_eq!(
        value.pointer("/project_root").and_then(|v| v.as_str()),
        Some(root.to_string_lossy().as_ref())
    );

    std::fs::remove_dir_all(&root).ok();
    Ok(())
}

#[test]
fn removed_target_vars_are_reported_ignored() -> io::Result<()> {
    let root = scratch_root("ignored");
    let output = Command::new(env!("CARGO_BIN_EXE_embranch"))
        .args(["config", "--json"])
        .env("DMMS_PROJECT_ROOT", &root)
        .env("DMMS_TARGET_BRANCH", "feature")
        .output()?;
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(stdout.trim()).map_err(io::Error::other)?;
    let ignored = value
        .get("ignored_vars")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert!(
        ignored.iter().any(|v| v.as_str() == Some("DMMS_TARGET_BRANCH")),
        "ignored_vars was {ignored:?}"
    );

    std::fs::remove_dir_all(&root).ok();
    Ok(())
}

#[test]
fn serve_dispatches_tools_over_stdio() -> io::Result<()> {
    use std::io::Write;
    use std::process::Stdio;

    let root = scratch_root("serve");
    let mut child = Command::new(env!("CARGO_BIN_EXE_embranch"))
        .arg("serve")
        .env("DMMS_PROJECT_ROOT", &root)
        .env("DOLT_EXECUTABLE_PATH", "/nonexistent/dolt")
        .env("ENABLE_LOGGING", "false")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;

    {
        let stdin = child.stdin.as_mut().ok_or_else(|| io::Error::other("no stdin"))?;
        writeln!(
            stdin,
            r#"{{"tool": "create_collection", "arguments": {{"name": "notes"}}}}"#
        )?;
        writeln!(stdin, r#"{{"tool": "list_collections"}}"#)?;
        writeln!(stdin, r#"{{"tool": "no_such_tool"}}"#)?;
    }
    drop(child.stdin.take());

    let output = child.wait_with_output()?;
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let responses: Vec<serde_json::Value> = stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(io::Error::other))
        .collect::<io::Result<_>>()?;
    assert_eq!(responses.len(), 3, "stdout was: {stdout}");

    let created = responses.first().expect("create response");
    assert_eq!(created.get("success"), Some(&serde_json::json!(true)));
    // Manifest mode is on and no repository exists, so mutating responses
    // carry the out-of-sync warning.
    assert_eq!(
        created
            .pointer("/dmms_warning/type")
            .and_then(|v| v.as_str()),
        Some("out_of_sync")
    );

    let listed = responses.get(1).expect("list response");
    assert_eq!(listed.get("success"), Some(&serde_json::json!(true)));
    assert_eq!(
        listed
            .pointer("/result/0/name")
            .and_then(|v| v.as_str()),
        Some("notes")
    );
    assert!(listed.get("dmms_warning").is_none());

    let unknown = responses.get(2).expect("unknown-tool response");
    assert_eq!(unknown.get("success"), Some(&serde_json::json!(false)));
    assert_eq!(
        unknown.get("error").and_then(|v| v.as_str()),
        Some("UNKNOWN_TOOL")
    );

    std::fs::remove_dir_all(&root).ok();
    Ok(())
}

#[test]
fn status_degrades_gracefully_without_dolt() -> io::Result<()> {
    let root = scratch_root("status");
    let output = Command::new(env!("CARGO_BIN_EXE_embranch"))
        .arg("status")
        .env("DMMS_PROJECT_ROOT", &root)
        .env("DOLT_EXECUTABLE_PATH", "/nonexistent/dolt")
        .env("ENABLE_LOGGING", "false")
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(io::Error::other(format!("status failed: {stderr}")));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(stdout.trim()).map_err(io::Error::other)?;
    assert_eq!(
        value
            .pointer("/repository/result/dolt_available")
            .and_then(|v| v.as_bool()),
        Some(false)
    );

    std::fs::remove_dir_all(&root).ok();
    Ok(())
}
