//! CLI integration tests for fleetmod.
//!
//! Each test builds a project directory with a local module index and a
//! `.fleetmod/config.toml` pointing at it, then drives the binary.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the fleetmod binary command, isolated from the user's global config.
fn fleetmod(project: &Path) -> Command {
    let mut cmd = Command::cargo_bin("fleetmod").unwrap();
    cmd.current_dir(project)
        .env("HOME", project)
        .env("XDG_CONFIG_HOME", project.join(".config"))
        .env("XDG_CACHE_HOME", project.join(".cache"));
    cmd
}

/// Write a release manifest into the index under `project/index`.
fn add_release(project: &Path, name: &str, version: &str, description: &str, groups: &str) {
    let lower = name.to_lowercase();
    let dir = project
        .join("index")
        .join(&lower[..1])
        .join(&lower);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join(format!("{version}.toml")),
        format!(
            "[module]\nname = \"{name}\"\nversion = \"{version}\"\ndescription = \"{description}\"\n{groups}"
        ),
    )
    .unwrap();
}

/// Create a project with one local index source.
fn project_with_index() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join(".fleetmod");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        r#"
[search]
timeout_secs = 10

[[sources]]
name = "local"
url = "index"
"#,
    )
    .unwrap();

    add_release(
        tmp.path(),
        "RemoteDesktop",
        "1.0.0",
        "View the remote screen",
        "",
    );
    add_release(
        tmp.path(),
        "RemoteDesktop",
        "1.1.0",
        "View the remote screen",
        "\n[[groups]]\nframework = \"any\"\ndependencies = [{ name = \"Screen.Capture\", version = \"^2\" }]\n",
    );
    add_release(tmp.path(), "Tasks", "2.0.0", "Scheduled tasks on clients", "");

    tmp
}

// ============================================================================
// fleetmod sources
// ============================================================================

#[test]
fn test_sources_lists_configured_sources() {
    let tmp = project_with_index();

    fleetmod(tmp.path())
        .arg("sources")
        .assert()
        .success()
        .stdout(predicate::str::contains("local").and(predicate::str::contains("index")));
}

// ============================================================================
// fleetmod search
// ============================================================================

#[test]
fn test_search_finds_matching_modules() {
    let tmp = project_with_index();

    fleetmod(tmp.path())
        .args(["search", "remote"])
        .assert()
        .success()
        .stdout(predicate::str::contains("RemoteDesktop v1.1.0"))
        .stdout(predicate::str::contains("Tasks").not());
}

#[test]
fn test_search_without_matches() {
    let tmp = project_with_index();

    fleetmod(tmp.path())
        .args(["search", "nothing-like-this"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No modules found"));
}

#[test]
fn test_search_json_output() {
    let tmp = project_with_index();

    let output = fleetmod(tmp.path())
        .args(["--json", "search", "tasks"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let first_line = String::from_utf8(output.stdout).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(first_line.lines().next().unwrap()).unwrap();
    assert_eq!(value["sources"]["local"], "completed");
    assert_eq!(value["items"][0]["identity"]["name"], "Tasks");
}

#[test]
fn test_search_reports_broken_source() {
    let tmp = project_with_index();
    fs::write(
        tmp.path().join(".fleetmod/config.toml"),
        r#"
[[sources]]
name = "local"
url = "index"

[[sources]]
name = "missing"
url = "no-such-index"
"#,
    )
    .unwrap();

    fleetmod(tmp.path())
        .args(["search", "tasks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tasks v2.0.0"))
        .stderr(predicate::str::contains("source `missing` failed"));
}

#[test]
fn test_search_without_sources_fails() {
    let tmp = TempDir::new().unwrap();

    fleetmod(tmp.path())
        .args(["search", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no module sources are configured"));
}

// ============================================================================
// fleetmod install / remove / list
// ============================================================================

#[test]
fn test_install_then_list_and_remove() {
    let tmp = project_with_index();
    let lock_path = tmp.path().join(".fleetmod/modules.lock");

    fleetmod(tmp.path())
        .args(["install", "remotedesktop"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Installed"));

    let lock = fs::read_to_string(&lock_path).unwrap();
    assert!(lock.contains("name = \"RemoteDesktop\""));
    assert!(lock.contains("version = \"1.1.0\""));

    fleetmod(tmp.path())
        .args(["list", "--framework", "net6.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("RemoteDesktop v1.1.0"))
        .stdout(predicate::str::contains("Screen.Capture ^2"));

    fleetmod(tmp.path())
        .args(["remove", "RemoteDesktop", "1.1.0"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Removed"));

    fleetmod(tmp.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No modules installed"));
}

#[test]
fn test_install_pinned_version() {
    let tmp = project_with_index();

    fleetmod(tmp.path())
        .args(["install", "RemoteDesktop", "--version", "1.0.0"])
        .assert()
        .success();

    fleetmod(tmp.path())
        .arg("outdated")
        .assert()
        .success()
        .stdout(predicate::str::contains("RemoteDesktop v1.0.0 -> v1.1.0"));
}

#[test]
fn test_install_unknown_module_fails() {
    let tmp = project_with_index();

    fleetmod(tmp.path())
        .args(["install", "Nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("was not found"));
}

#[test]
fn test_remove_not_installed_is_skipped() {
    let tmp = project_with_index();

    fleetmod(tmp.path())
        .args(["remove", "Tasks", "2.0.0"])
        .assert()
        .success()
        .stderr(predicate::str::contains("not installed"));
}

#[test]
fn test_corrupt_lock_file_is_reported() {
    let tmp = project_with_index();
    fs::write(tmp.path().join(".fleetmod/modules.lock"), "not [valid").unwrap();

    fleetmod(tmp.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("corrupt"));
}

// ============================================================================
// fleetmod completions
// ============================================================================

#[test]
fn test_completions_bash() {
    let tmp = TempDir::new().unwrap();

    fleetmod(tmp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fleetmod"));
}
