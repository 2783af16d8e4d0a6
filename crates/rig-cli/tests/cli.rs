//! Smoke tests for the `rig` binary.

use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// A scratch directory with its own rig root.
struct TestContext {
    temp_dir: TempDir,
    root: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let root = temp_dir.path().join("root");
        Self { temp_dir, root }
    }

    fn rig_cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_rig"));
        cmd.current_dir(self.temp_dir.path());
        cmd.env("RIG_ROOT_DIR", &self.root);
        cmd.env_remove("RIG_CONFIG");
        cmd.env_remove("RIG_GLOBAL_CONFIG");
        cmd
    }
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.rig_cmd().arg("--help").output().expect("failed to run rig");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("update-checksum"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    let output = ctx.rig_cmd().arg("--version").output().expect("failed to run rig");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("rig"));
}

#[test]
fn test_explicit_missing_config_fails() {
    let ctx = TestContext::new();
    let output = ctx
        .rig_cmd()
        .args(["--config", "does-not-exist.toml", "install"])
        .output()
        .expect("failed to run rig");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No rig.toml found"));
}

#[test]
fn test_only_link_with_empty_config() {
    let ctx = TestContext::new();
    std::fs::write(ctx.temp_dir.path().join("rig.toml"), "packages = []\n").unwrap();
    let output = ctx
        .rig_cmd()
        .args(["install", "--only-link"])
        .output()
        .expect("failed to run rig");
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
}
