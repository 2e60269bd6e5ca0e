//! CLI subprocess integration tests.
//!
//! These tests invoke the `bento` binary as a subprocess and verify exit
//! codes, stdout content, and on-disk effects. Manager-backed commands run
//! against a stub pixi script, so no real package manager is needed.

use std::path::{Path, PathBuf};
use std::process::Command;

fn bento_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_bento"))
}

fn write_declarations(dir: &Path) -> PathBuf {
    let path = dir.join("bento.toml");
    std::fs::write(
        &path,
        r#"declaration_version = 1

[[environment]]
name = "myenv"
version = "1.0.0"
[environment.source]
toml = "[project]\nname = \"myenv\"\n"
"#,
    )
    .unwrap();
    path
}

fn write_empty_declarations(dir: &Path) -> PathBuf {
    let path = dir.join("bento.toml");
    std::fs::write(&path, "declaration_version = 1\n").unwrap();
    path
}

#[cfg(unix)]
fn write_stub_pixi(dir: &Path, exit_code: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("pixi");
    std::fs::write(
        &path,
        format!(
            r#"#!/bin/sh
case "$1" in
  lock) printf 'version: 6\n' > pixi.lock ;;
esac
if [ {exit_code} -ne 0 ]; then
  echo "stub: nothing resolves" >&2
fi
exit {exit_code}
"#
        ),
    )
    .unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn version_flag_exits_zero() {
    let output = bento_bin().arg("--version").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("bento"));
}

#[test]
fn missing_declarations_file_is_a_declaration_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = bento_bin()
        .args(["list", "--declarations"])
        .arg(dir.path().join("missing.toml"))
        .env("BENTO_BUNDLING_PATH", dir.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn list_with_no_environments_reports_platform() {
    let dir = tempfile::tempdir().unwrap();
    let declarations = write_empty_declarations(dir.path());
    let output = bento_bin()
        .args(["list", "--declarations"])
        .arg(&declarations)
        .env("BENTO_BUNDLING_PATH", dir.path().join("root"))
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("no environments declared"));
}

#[test]
fn list_shows_uninstalled_state() {
    let dir = tempfile::tempdir().unwrap();
    let declarations = write_declarations(dir.path());
    let output = bento_bin()
        .args(["list", "--declarations"])
        .arg(&declarations)
        .env("BENTO_BUNDLING_PATH", dir.path().join("root"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("myenv"));
    assert!(stdout.contains("uninstalled"));
}

#[test]
fn root_prints_the_override_path() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    let output = bento_bin()
        .arg("root")
        .env("BENTO_BUNDLING_PATH", &root)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(&root.display().to_string()));
}

#[test]
fn inspect_without_record_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = bento_bin()
        .args(["inspect", "ghost"])
        .env("BENTO_BUNDLING_PATH", dir.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no install record"));
}

#[cfg(unix)]
#[test]
fn provision_with_stub_manager_installs_and_records() {
    let dir = tempfile::tempdir().unwrap();
    let declarations = write_declarations(dir.path());
    let stub = write_stub_pixi(dir.path(), 0);
    let root = dir.path().join("root");

    let output = bento_bin()
        .args(["provision", "--declarations"])
        .arg(&declarations)
        .env("BENTO_BUNDLING_PATH", &root)
        .env("BENTO_PIXI_EXECUTABLE", &stub)
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "provision failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("ready"));
    assert!(root.join("myenv").join(".bento-install.json").is_file());
    assert!(root.join("myenv").join("pixi.toml").is_file());
}

#[cfg(unix)]
#[test]
fn provision_reports_install_failures() {
    let dir = tempfile::tempdir().unwrap();
    let declarations = write_declarations(dir.path());
    let stub = write_stub_pixi(dir.path(), 7);
    let root = dir.path().join("root");

    let output = bento_bin()
        .args(["provision", "--declarations"])
        .arg(&declarations)
        .env("BENTO_BUNDLING_PATH", &root)
        .env("BENTO_PIXI_EXECUTABLE", &stub)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("failed"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("nothing resolves"));
    // The failure is recorded, not hidden.
    let record = std::fs::read_to_string(root.join("myenv").join(".bento-install.json")).unwrap();
    assert!(record.contains("\"failed\""));
}

#[cfg(unix)]
#[test]
fn inspect_after_provision_shows_success() {
    let dir = tempfile::tempdir().unwrap();
    let declarations = write_declarations(dir.path());
    let stub = write_stub_pixi(dir.path(), 0);
    let root = dir.path().join("root");

    let provision = bento_bin()
        .args(["provision", "--declarations"])
        .arg(&declarations)
        .env("BENTO_BUNDLING_PATH", &root)
        .env("BENTO_PIXI_EXECUTABLE", &stub)
        .output()
        .unwrap();
    assert!(provision.status.success());

    let output = bento_bin()
        .args(["inspect", "myenv"])
        .env("BENTO_BUNDLING_PATH", &root)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("success"));
    assert!(stdout.contains("1.0.0"));
}

#[cfg(unix)]
#[test]
fn lock_prints_the_generated_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let stub = write_stub_pixi(dir.path(), 0);
    let manifest = dir.path().join("env.toml");
    std::fs::write(&manifest, "[project]\nname = \"t\"\n").unwrap();

    let output = bento_bin()
        .arg("lock")
        .arg(&manifest)
        .env("BENTO_PIXI_EXECUTABLE", &stub)
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "lock failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("version: 6"));
}

#[cfg(unix)]
#[test]
fn lock_failure_reports_captured_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let stub = write_stub_pixi(dir.path(), 5);
    let manifest = dir.path().join("env.toml");
    std::fs::write(&manifest, "[project]\nname = \"t\"\n").unwrap();

    let output = bento_bin()
        .arg("lock")
        .arg(&manifest)
        .env("BENTO_PIXI_EXECUTABLE", &stub)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("nothing resolves"));
}

#[test]
fn provision_without_a_manager_fails_clearly() {
    let dir = tempfile::tempdir().unwrap();
    let declarations = write_declarations(dir.path());

    let output = bento_bin()
        .args(["provision", "--declarations"])
        .arg(&declarations)
        .env("BENTO_BUNDLING_PATH", dir.path().join("root"))
        .env_remove("BENTO_PIXI_EXECUTABLE")
        .env("PATH", "")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}
