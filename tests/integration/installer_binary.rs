//! The standalone `plugin-installer` executable: exit codes, instruction
//! cleanup, and the manager's external install mode.

use crate::common::{MAIN_ARTIFACT, PLUGIN_ID, TestPlugin, spawn_registry};
use assert_cmd::Command;
use plugin_updater::constants::INSTRUCTION_FILE_NAME;
use plugin_updater::test_utils::zip_bytes;
use plugin_updater::update::{InstallInstruction, UpdateOutcome};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

const INSTALLER_BIN: &str = env!("CARGO_BIN_EXE_plugin-installer");

fn stage(plugin: &TestPlugin, name: &str, content: &[u8]) -> PathBuf {
    let staging = plugin.dir.join("Temp");
    fs::create_dir_all(&staging).unwrap();
    let path = staging.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn write_instruction(plugin: &TestPlugin, source: &Path) -> PathBuf {
    let instruction = InstallInstruction {
        source_file: source.to_path_buf(),
        target_directory: plugin.dir.clone(),
        main_artifact_file_name: MAIN_ARTIFACT.to_string(),
        new_version: "1.2.0".to_string(),
        backup_directory: plugin.dir.join("Backup"),
        log_file: plugin.dir.join("Logs").join("installer_test.log"),
        host_process_name: None,
        installer_path: None,
        config_file: None,
    };
    let path = plugin.dir.join("Temp").join(INSTRUCTION_FILE_NAME);
    instruction.write(&path).unwrap();
    path
}

#[test]
fn test_installer_exit_0_on_success() {
    plugin_updater::test_utils::init_test_logging(None);
    let plugin = TestPlugin::new("http://127.0.0.1:9");
    let source = stage(
        &plugin,
        "update_1.2.0_a.zip",
        &zip_bytes(&[(MAIN_ARTIFACT, b"acme v1.2.0"), ("resources/new.txt", b"new")]),
    );
    let instruction = write_instruction(&plugin, &source);

    Command::new(INSTALLER_BIN)
        .arg(&instruction)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Installed version 1.2.0"));

    assert!(!instruction.exists(), "instruction consumed");
    assert!(!source.exists(), "staged artifact removed");
    assert_eq!(plugin.read(MAIN_ARTIFACT), b"acme v1.2.0");
    assert_eq!(plugin.read("resources/new.txt"), b"new");
    assert_eq!(plugin.backup_count(), 1);

    let log = fs::read_to_string(plugin.dir.join("Logs").join("installer_test.log")).unwrap();
    assert!(log.contains("1.2.0"));
}

#[test]
fn test_installer_exit_2_restores_previous_files() {
    plugin_updater::test_utils::init_test_logging(None);
    let plugin = TestPlugin::new("http://127.0.0.1:9");
    let before = plugin.snapshot();

    // The second entry needs a directory where the main artifact file sits
    let source = stage(
        &plugin,
        "update_1.2.0_b.zip",
        &zip_bytes(&[
            ("resources/strings.json", b"overwritten"),
            (&format!("{MAIN_ARTIFACT}/inner.txt"), b"conflict"),
        ]),
    );
    let instruction = write_instruction(&plugin, &source);

    Command::new(INSTALLER_BIN)
        .arg(&instruction)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("rolled back"));

    assert!(!instruction.exists());
    assert_eq!(plugin.snapshot(), before, "install directory restored byte for byte");
    assert!(source.exists(), "staged artifact kept for another attempt");
}

#[test]
fn test_installer_exit_1_when_source_missing() {
    plugin_updater::test_utils::init_test_logging(None);
    let plugin = TestPlugin::new("http://127.0.0.1:9");
    let before = plugin.snapshot();
    fs::create_dir_all(plugin.dir.join("Temp")).unwrap();
    let instruction = write_instruction(&plugin, &plugin.dir.join("Temp").join("gone.zip"));

    Command::new(INSTALLER_BIN).arg(&instruction).assert().code(1);

    assert!(!instruction.exists());
    assert_eq!(plugin.snapshot(), before);
    assert_eq!(plugin.backup_count(), 0);
}

#[test]
fn test_installer_exit_1_on_unreadable_instruction() {
    plugin_updater::test_utils::init_test_logging(None);
    let plugin = TestPlugin::new("http://127.0.0.1:9");
    fs::create_dir_all(plugin.dir.join("Temp")).unwrap();
    let instruction = plugin.dir.join("Temp").join(INSTRUCTION_FILE_NAME);
    fs::write(&instruction, "{ not json").unwrap();

    Command::new(INSTALLER_BIN)
        .arg(&instruction)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse install instruction"));

    assert!(!instruction.exists(), "a bad instruction is still deleted");
}

#[test]
fn test_installer_rejects_7z_before_backup() {
    plugin_updater::test_utils::init_test_logging(None);
    let plugin = TestPlugin::new("http://127.0.0.1:9");
    let before = plugin.snapshot();
    let source = stage(&plugin, "update_1.2.0_c.7z", b"7z\xbc\xaf\x27\x1c");
    let instruction = write_instruction(&plugin, &source);

    Command::new(INSTALLER_BIN)
        .arg(&instruction)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unsupported archive format"));

    assert_eq!(plugin.snapshot(), before);
    assert_eq!(plugin.backup_count(), 0);
}

#[tokio::test]
async fn test_manager_external_mode_runs_installer() {
    plugin_updater::test_utils::init_test_logging(None);
    let (registry, url) = spawn_registry().await;
    let plugin = TestPlugin::new(&url);
    plugin.edit_config(|c| c.installer_path = PathBuf::from(INSTALLER_BIN));
    registry.publish(
        PLUGIN_ID,
        "1.2.0",
        "Acme.zip",
        "",
        zip_bytes(&[(MAIN_ARTIFACT, b"acme v1.2.0")]),
    );

    let service = plugin_updater::config::ConfigService::open(
        Box::new(plugin_updater::config::FileConfigStore::new(plugin.config_path())),
        &plugin.dir,
    )
    .unwrap();
    let mut manager =
        plugin_updater::update::UpdateManager::new(service, plugin_updater::update::InstallMode::External)
            .unwrap();

    let latest = manager.check_for_updates().await.unwrap().unwrap();
    let outcome = manager.download_and_install(&latest, true, None).await;

    assert_eq!(
        outcome,
        UpdateOutcome::Installed {
            version: "1.2.0".to_string()
        }
    );
    assert_eq!(plugin.read(MAIN_ARTIFACT), b"acme v1.2.0");
    assert_eq!(plugin.stored_config().current_version, "1.2.0");
    assert!(!plugin.dir.join("Temp").join(INSTRUCTION_FILE_NAME).exists());
}

#[tokio::test]
async fn test_manager_external_mode_maps_rollback() {
    plugin_updater::test_utils::init_test_logging(None);
    let (registry, url) = spawn_registry().await;
    let plugin = TestPlugin::new(&url);
    plugin.edit_config(|c| c.installer_path = PathBuf::from(INSTALLER_BIN));
    registry.publish(
        PLUGIN_ID,
        "1.2.0",
        "Acme.zip",
        "",
        zip_bytes(&[(&format!("{MAIN_ARTIFACT}/inner.txt"), b"conflict")]),
    );
    let before = plugin.snapshot();

    let service = plugin_updater::config::ConfigService::open(
        Box::new(plugin_updater::config::FileConfigStore::new(plugin.config_path())),
        &plugin.dir,
    )
    .unwrap();
    let mut manager =
        plugin_updater::update::UpdateManager::new(service, plugin_updater::update::InstallMode::External)
            .unwrap();

    let latest = manager.check_for_updates().await.unwrap().unwrap();
    let outcome = manager.download_and_install(&latest, true, None).await;

    assert!(matches!(outcome, UpdateOutcome::RolledBack { .. }), "{outcome:?}");
    assert_eq!(plugin.snapshot(), before);
    assert_eq!(plugin.stored_config().current_version, "1.0.0");
}

#[tokio::test]
async fn test_manager_detached_mode_returns_before_install_and_installer_records_version() {
    plugin_updater::test_utils::init_test_logging(None);
    let (registry, url) = spawn_registry().await;
    let plugin = TestPlugin::new(&url);
    plugin.edit_config(|c| c.installer_path = PathBuf::from(INSTALLER_BIN));
    registry.publish(
        PLUGIN_ID,
        "1.2.0",
        "Acme.zip",
        "",
        zip_bytes(&[(MAIN_ARTIFACT, b"acme v1.2.0")]),
    );

    let service = plugin_updater::config::ConfigService::open(
        Box::new(plugin_updater::config::FileConfigStore::new(plugin.config_path())),
        &plugin.dir,
    )
    .unwrap();
    let mut manager =
        plugin_updater::update::UpdateManager::new(service, plugin_updater::update::InstallMode::Detached)
            .unwrap();

    let latest = manager.check_for_updates().await.unwrap().unwrap();
    let outcome = manager.download_and_install(&latest, true, None).await;

    assert_eq!(
        outcome,
        UpdateOutcome::InstallScheduled {
            version: "1.2.0".to_string()
        }
    );
    // Nobody waited, so this process has not recorded anything
    assert_eq!(manager.config().current_version, "1.0.0");

    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(20);
    while plugin.stored_config().current_version != "1.2.0" {
        assert!(std::time::Instant::now() < deadline, "detached installer never finished");
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }

    assert_eq!(plugin.read(MAIN_ARTIFACT), b"acme v1.2.0");
    assert!(!plugin.dir.join("Temp").join(INSTRUCTION_FILE_NAME).exists());
}
