//! The `plugin-updater` command line against real plugin directories.

use crate::common::{MAIN_ARTIFACT, PLUGIN_ID, TestPlugin, spawn_registry};
use assert_cmd::Command;
use plugin_updater::test_utils::zip_bytes;
use plugin_updater::update::descriptor::STAGED_RECORD_SUFFIX;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn updater() -> Command {
    let mut cmd = Command::cargo_bin("plugin-updater").unwrap();
    cmd.env_remove("PLUGIN_UPDATER_DIR").env("PLUGIN_UPDATER_NO_PROGRESS", "1");
    cmd
}

#[test]
fn test_status_creates_default_config() {
    plugin_updater::test_utils::init_test_logging(None);
    let temp = TempDir::new().unwrap();

    updater()
        .arg("--plugin-dir")
        .arg(temp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("current version:  1.0.0"))
        .stdout(predicate::str::contains("Update checks are disabled"))
        .stdout(predicate::str::contains("plugin_unique_id"));

    let written = fs::read_to_string(temp.path().join("update-config.toml")).unwrap();
    assert!(written.contains("your-plugin-unique-id"));
    assert!(temp.path().join("Logs").is_dir(), "command log written under the plugin directory");
}

#[test]
fn test_status_reports_complete_config() {
    plugin_updater::test_utils::init_test_logging(None);
    let plugin = TestPlugin::new("http://127.0.0.1:9");

    updater()
        .arg("--plugin-dir")
        .arg(&plugin.dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is complete"))
        .stdout(predicate::str::contains(PLUGIN_ID))
        .stdout(predicate::str::contains("Backups (0)"));
}

#[test]
fn test_check_with_placeholders_fails() {
    plugin_updater::test_utils::init_test_logging(None);
    let temp = TempDir::new().unwrap();

    updater()
        .arg("--plugin-dir")
        .arg(temp.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration is incomplete"));
}

#[test]
fn test_prune_keeps_five_newest() {
    plugin_updater::test_utils::init_test_logging(None);
    let plugin = TestPlugin::new("http://127.0.0.1:9");
    let root = plugin.dir.join("Backup");
    for i in 1..=7 {
        let backup = root.join(format!("backup_20260101_00000{i}_000"));
        fs::create_dir_all(&backup).unwrap();
        fs::write(backup.join(MAIN_ARTIFACT), format!("v{i}")).unwrap();
    }

    updater()
        .arg("--plugin-dir")
        .arg(&plugin.dir)
        .arg("prune")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pruned 2 backups"));

    let mut left: Vec<String> = fs::read_dir(&root)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    left.sort();
    assert_eq!(left.len(), 5);
    assert_eq!(left[0], "backup_20260101_000003_000");

    updater()
        .arg("--plugin-dir")
        .arg(&plugin.dir)
        .arg("prune")
        .assert()
        .success()
        .stdout(predicate::str::contains("No backups to prune"));
}

#[tokio::test]
async fn test_update_then_install_staged() {
    plugin_updater::test_utils::init_test_logging(None);
    let (registry, url) = spawn_registry().await;
    let plugin = TestPlugin::new(&url);
    registry.publish(PLUGIN_ID, "1.4.0", "Acme.zip", "", zip_bytes(&[(MAIN_ARTIFACT, b"acme v1.4.0")]));

    let dir = plugin.dir.clone();
    let output = tokio::task::spawn_blocking(move || {
        updater()
            .arg("--plugin-dir")
            .arg(&dir)
            .args(["update", "--no-install"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Version 1.4.0 downloaded and verified"))
            .get_output()
            .clone()
    })
    .await
    .unwrap();
    assert!(String::from_utf8_lossy(&output.stdout).contains("plugin-updater install"));
    assert_eq!(plugin.read(MAIN_ARTIFACT), b"acme v1.0.0");

    let staged = plugin.staged_files();
    assert_eq!(staged.len(), 2, "artifact and its download record: {staged:?}");
    let staged = staged
        .into_iter()
        .find(|p| !p.to_string_lossy().ends_with(STAGED_RECORD_SUFFIX))
        .unwrap();

    let dir = plugin.dir.clone();
    tokio::task::spawn_blocking(move || {
        updater()
            .arg("--plugin-dir")
            .arg(&dir)
            .arg("install")
            .arg(&staged)
            .args(["1.4.0", "--in-process"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Installed version 1.4.0"));
    })
    .await
    .unwrap();

    assert_eq!(plugin.read(MAIN_ARTIFACT), b"acme v1.4.0");
    assert_eq!(plugin.stored_config().current_version, "1.4.0");
    assert!(plugin.staged_files().is_empty(), "artifact and record both removed");
}

#[test]
fn test_install_missing_file_fails() {
    plugin_updater::test_utils::init_test_logging(None);
    let plugin = TestPlugin::new("http://127.0.0.1:9");

    updater()
        .arg("--plugin-dir")
        .arg(&plugin.dir)
        .args(["install", "nope.zip", "1.2.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Staged file not found"));
}
