use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn xrpreview(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_xrpreview"))
        .env("XRPREVIEW_CONFIG_DIR", config_dir)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to run xrpreview")
}

fn report(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "xrpreview failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is a json report")
}

#[test]
fn default_run_completes_one_session() {
    let root = TempDir::new().unwrap();
    let output = xrpreview(root.path(), &["--frames", "12", "--report", "json"]);
    let report = report(&output);

    assert_eq!(report["state"], "idle");
    assert_eq!(report["trigger_label"], "Enter XR");
    assert_eq!(report["trigger_action"], "start");
    assert_eq!(report["attempts"], 1);
    assert_eq!(report["sessions_completed"], 1);
    assert_eq!(report["frames_rendered"], 12);
    assert!(report["last_error"].is_null());
}

#[test]
fn host_termination_returns_to_idle() {
    let root = TempDir::new().unwrap();
    let output = xrpreview(
        root.path(),
        &["--frames", "5", "--end-by", "host", "--report", "json"],
    );
    let report = report(&output);
    assert_eq!(report["state"], "idle");
    assert_eq!(report["sessions_completed"], 1);
    assert_eq!(report["frames_rendered"], 5);
}

#[test]
fn unsupported_platform_keeps_trigger_hidden() {
    let root = TempDir::new().unwrap();
    let output = xrpreview(root.path(), &["--unsupported", "--report", "json"]);
    let report = report(&output);
    assert_eq!(report["attempts"], 0);
    assert_eq!(report["trigger_visible"], false);
    assert!(report["last_error"]
        .as_str()
        .unwrap()
        .contains("not supported"));
}

#[test]
fn failures_are_reported_without_failing_the_process() {
    let root = TempDir::new().unwrap();
    for flag in ["--reject-request", "--fail-compat", "--fail-layer", "--reject-end"] {
        let output = xrpreview(root.path(), &[flag, "--frames", "3", "--report", "json"]);
        let report = report(&output);
        assert_eq!(report["state"], "idle", "{flag}");
        assert_eq!(report["trigger_label"], "Enter XR", "{flag}");
        assert!(report["last_error"].is_string(), "{flag}");
    }
}

#[test]
fn config_file_labels_are_used() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("preview.toml"),
        r#"
version = 1
[trigger]
enter_label = "Start AR"
[frame]
max_fps = 0
"#,
    )
    .unwrap();

    let output = xrpreview(root.path(), &["--frames", "2", "--report", "json"]);
    let report = report(&output);
    assert_eq!(report["trigger_label"], "Start AR");
    assert_eq!(report["frames_rendered"], 2);
}

#[test]
fn invalid_config_fails() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("preview.toml"), "version = 2\n").unwrap();

    let run = xrpreview(root.path(), &[]);
    assert!(!run.status.success());

    let check = xrpreview(root.path(), &["config", "check"]);
    assert!(!check.status.success());
}

#[test]
fn missing_explicit_config_fails() {
    let root = TempDir::new().unwrap();
    let missing = root.path().join("absent.toml");
    let output = xrpreview(root.path(), &["--config", missing.to_str().unwrap()]);
    assert!(!output.status.success());
}

#[test]
fn config_where_reports_override_dir() {
    let root = TempDir::new().unwrap();
    let output = xrpreview(root.path(), &["config", "where"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&root.path().display().to_string()));
    assert!(stdout.contains("missing"));
}

#[test]
fn text_report_is_default() {
    let root = TempDir::new().unwrap();
    let output = xrpreview(root.path(), &["--frames", "1"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("state:              idle"));
    assert!(stdout.contains("frames rendered:    1"));
}
