//! End-to-end update cycles against a live registry, installing in-process.

use crate::common::{MAIN_ARTIFACT, PLUGIN_ID, TestPlugin, spawn_registry};
use chrono::{Duration, Utc};
use plugin_updater::core::UpdateError;
use plugin_updater::test_utils::zip_bytes;
use plugin_updater::update::{StartupCheck, UpdateOutcome};
use tokio::sync::mpsc;

#[tokio::test]
async fn test_newer_zip_release_is_installed_and_recorded() {
    plugin_updater::test_utils::init_test_logging(None);
    let (registry, url) = spawn_registry().await;
    let plugin = TestPlugin::new(&url);

    let archive = zip_bytes(&[
        (MAIN_ARTIFACT, b"acme v1.2.0".as_slice()),
        ("resources/strings.json", br#"{"title":"Acme 1.2"}"#.as_slice()),
        ("resources/icons/wall.png", b"png".as_slice()),
    ]);
    registry.publish(PLUGIN_ID, "1.2.0", "Acme.zip", "Faster walls", archive);

    let mut manager = plugin.manager();
    let latest = manager.check_for_updates().await.unwrap().expect("1.2.0 is newer than 1.0.0");
    assert_eq!(latest.version, "1.2.0");
    assert_eq!(latest.release_notes, "Faster walls");

    let (tx, mut rx) = mpsc::channel(128);
    let outcome = manager.download_and_install(&latest, true, Some(tx)).await;
    assert_eq!(
        outcome,
        UpdateOutcome::Installed {
            version: "1.2.0".to_string()
        }
    );

    let mut reported = Vec::new();
    while let Ok(p) = rx.try_recv() {
        reported.push(p);
    }
    assert_eq!(reported.last(), Some(&100));
    assert!(reported.windows(2).all(|w| w[0] < w[1]));

    assert_eq!(plugin.read(MAIN_ARTIFACT), b"acme v1.2.0");
    assert_eq!(plugin.read("resources/strings.json"), br#"{"title":"Acme 1.2"}"#);
    assert_eq!(plugin.read("resources/icons/wall.png"), b"png");

    // Persisted, and visible to a fresh load
    assert_eq!(manager.config().current_version, "1.2.0");
    let stored = plugin.stored_config();
    assert_eq!(stored.current_version, "1.2.0");
    assert!(stored.last_check_time.is_some());

    assert_eq!(plugin.backup_count(), 1);
    assert!(plugin.staged_files().is_empty(), "staged artifact removed after install");
}

#[tokio::test]
async fn test_single_file_release_replaces_main_artifact() {
    plugin_updater::test_utils::init_test_logging(None);
    let (registry, url) = spawn_registry().await;
    let plugin = TestPlugin::new(&url);

    registry.publish(PLUGIN_ID, "1.0.1", "AcmeWalls.dll", "", b"acme v1.0.1".to_vec());

    let mut manager = plugin.manager();
    let latest = manager.check_for_updates().await.unwrap().unwrap();
    let outcome = manager.download_and_install(&latest, true, None).await;

    assert!(outcome.is_success(), "{outcome}");
    assert_eq!(plugin.read(MAIN_ARTIFACT), b"acme v1.0.1");
    // Untouched siblings survive a single-file replace
    assert_eq!(plugin.read("resources/strings.json"), br#"{"title":"Acme"}"#);
}

#[tokio::test]
async fn test_older_server_version_is_not_offered() {
    plugin_updater::test_utils::init_test_logging(None);
    let (registry, url) = spawn_registry().await;
    let plugin = TestPlugin::new(&url);
    plugin.edit_config(|c| c.current_version = "2.0.0".to_string());

    registry.publish(PLUGIN_ID, "1.9.9", "Acme.zip", "", zip_bytes(&[(MAIN_ARTIFACT, b"old")]));
    let before = plugin.snapshot();

    let mut manager = plugin.manager();
    assert_eq!(manager.check_for_updates().await.unwrap(), None);

    assert!(plugin.staged_files().is_empty(), "nothing downloaded");
    assert_eq!(plugin.snapshot(), before);
    assert_eq!(plugin.stored_config().current_version, "2.0.0");
}

#[tokio::test]
async fn test_unpublished_plugin_reports_no_update() {
    plugin_updater::test_utils::init_test_logging(None);
    let (_registry, url) = spawn_registry().await;
    let plugin = TestPlugin::new(&url);

    let mut manager = plugin.manager();
    assert_eq!(manager.check_for_updates().await.unwrap(), None);
}

#[tokio::test]
async fn test_hash_mismatch_fails_without_touching_install() {
    plugin_updater::test_utils::init_test_logging(None);
    let (registry, url) = spawn_registry().await;
    let plugin = TestPlugin::new(&url);

    let mut descriptor = registry.publish(
        PLUGIN_ID,
        "1.2.0",
        "Acme.zip",
        "",
        zip_bytes(&[(MAIN_ARTIFACT, b"acme v1.2.0")]),
    );
    descriptor.file_hash = "0".repeat(64);
    let before = plugin.snapshot();

    let mut manager = plugin.manager();
    let outcome = manager.download_and_install(&descriptor, true, None).await;

    match outcome {
        UpdateOutcome::Failed {
            error: UpdateError::Integrity {
                expected,
                ..
            },
        } => assert_eq!(expected, "0".repeat(64)),
        other => panic!("expected an integrity failure, got {other:?}"),
    }

    assert_eq!(plugin.snapshot(), before);
    assert_eq!(plugin.backup_count(), 0, "no backup before verification passes");
    assert!(plugin.staged_files().is_empty(), "rejected download deleted");
    assert_eq!(plugin.stored_config().current_version, "1.0.0");
}

#[tokio::test]
async fn test_missing_artifact_is_a_transport_failure() {
    plugin_updater::test_utils::init_test_logging(None);
    let (registry, url) = spawn_registry().await;
    let plugin = TestPlugin::new(&url);

    let descriptor =
        registry.publish(PLUGIN_ID, "1.2.0", "Acme.zip", "", zip_bytes(&[(MAIN_ARTIFACT, b"x")]));
    assert!(registry.unpublish(PLUGIN_ID, "1.2.0"));

    let mut manager = plugin.manager();
    let outcome = manager.download_and_install(&descriptor, true, None).await;
    assert!(
        matches!(
            outcome,
            UpdateOutcome::Failed {
                error: UpdateError::Transport { .. }
            }
        ),
        "{outcome:?}"
    );
    assert!(plugin.staged_files().is_empty());
}

#[tokio::test]
async fn test_manual_install_after_staging() {
    plugin_updater::test_utils::init_test_logging(None);
    let (registry, url) = spawn_registry().await;
    let plugin = TestPlugin::new(&url);

    registry.publish(PLUGIN_ID, "1.1.0", "Acme.zip", "", zip_bytes(&[(MAIN_ARTIFACT, b"acme v1.1.0")]));

    let mut manager = plugin.manager();
    let latest = manager.check_for_updates().await.unwrap().unwrap();
    let outcome = manager.download_and_install(&latest, false, None).await;

    let (version, staged_file) = match outcome {
        UpdateOutcome::PendingManualInstall {
            version,
            staged_file,
        } => (version, staged_file),
        other => panic!("expected a pending install, got {other:?}"),
    };
    assert_eq!(version, "1.1.0");
    assert!(staged_file.starts_with(plugin.dir.join("Temp")));
    assert!(staged_file.extension().is_some_and(|ext| ext == "zip"));

    // Staging alone changes nothing
    assert_eq!(plugin.read(MAIN_ARTIFACT), b"acme v1.0.0");
    assert_eq!(plugin.stored_config().current_version, "1.0.0");

    let outcome = manager.install_staged(&staged_file, &version).await;
    assert!(matches!(outcome, UpdateOutcome::Installed { .. }), "{outcome:?}");
    assert_eq!(plugin.read(MAIN_ARTIFACT), b"acme v1.1.0");
    assert_eq!(plugin.stored_config().current_version, "1.1.0");
}

#[tokio::test]
async fn test_startup_check_gating() {
    plugin_updater::test_utils::init_test_logging(None);
    let (registry, url) = spawn_registry().await;
    let plugin = TestPlugin::new(&url);
    registry.publish(PLUGIN_ID, "1.3.0", "Acme.zip", "", zip_bytes(&[(MAIN_ARTIFACT, b"acme v1.3.0")]));

    // Checked an hour ago with a 24h interval
    plugin.edit_config(|c| c.last_check_time = Some(Utc::now() - Duration::hours(1)));
    let mut manager = plugin.manager();
    assert_eq!(manager.startup_check(Utc::now(), None).await, StartupCheck::NotDue);

    // Due, but automatic download is off
    plugin.edit_config(|c| {
        c.last_check_time = Some(Utc::now() - Duration::hours(25));
        c.auto_download = false;
    });
    let mut manager = plugin.manager();
    match manager.startup_check(Utc::now(), None).await {
        StartupCheck::Available(descriptor) => assert_eq!(descriptor.version, "1.3.0"),
        other => panic!("expected an available update, got {other:?}"),
    }
    assert_eq!(plugin.read(MAIN_ARTIFACT), b"acme v1.0.0");
}

#[tokio::test]
async fn test_startup_check_auto_installs() {
    plugin_updater::test_utils::init_test_logging(None);
    let (registry, url) = spawn_registry().await;
    let plugin = TestPlugin::new(&url);
    registry.publish(PLUGIN_ID, "1.3.0", "Acme.zip", "", zip_bytes(&[(MAIN_ARTIFACT, b"acme v1.3.0")]));
    plugin.edit_config(|c| {
        c.last_check_time = None;
        c.auto_download = true;
        c.auto_install = true;
    });

    let mut manager = plugin.manager();
    let result = manager.startup_check(Utc::now(), None).await;
    assert_eq!(
        result,
        StartupCheck::Updated(UpdateOutcome::Installed {
            version: "1.3.0".to_string()
        })
    );
    assert_eq!(plugin.read(MAIN_ARTIFACT), b"acme v1.3.0");
}

#[tokio::test]
async fn test_startup_check_swallows_unreachable_server() {
    plugin_updater::test_utils::init_test_logging(None);
    // Nothing listens on port 9 locally
    let plugin = TestPlugin::new("http://127.0.0.1:9");
    plugin.edit_config(|c| c.last_check_time = None);

    let mut manager = plugin.manager();
    let result = manager.startup_check(Utc::now(), None).await;
    assert!(
        matches!(result, StartupCheck::CheckFailed(UpdateError::Transport { .. })),
        "{result:?}"
    );
    assert!(plugin.stored_config().last_check_time.is_none(), "failed checks are not recorded");
}

#[tokio::test]
async fn test_placeholder_config_blocks_checks() {
    plugin_updater::test_utils::init_test_logging(None);
    let (_registry, url) = spawn_registry().await;
    let plugin = TestPlugin::new(&url);
    plugin.edit_config(|c| c.plugin_unique_id = "your-plugin-unique-id".to_string());

    let mut manager = plugin.manager();
    assert_eq!(manager.startup_check(Utc::now(), None).await, StartupCheck::NotConfigured);

    match manager.check_for_updates().await {
        Err(UpdateError::Configuration {
            issues,
        }) => assert!(issues.iter().any(|i| i.contains("plugin_unique_id"))),
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_staged_file_modified_before_install_is_refused() {
    plugin_updater::test_utils::init_test_logging(None);
    let (registry, url) = spawn_registry().await;
    let plugin = TestPlugin::new(&url);

    registry.publish(PLUGIN_ID, "1.1.0", "Acme.zip", "", zip_bytes(&[(MAIN_ARTIFACT, b"acme v1.1.0")]));

    let mut manager = plugin.manager();
    let latest = manager.check_for_updates().await.unwrap().unwrap();
    let staged_file = match manager.download_and_install(&latest, false, None).await {
        UpdateOutcome::PendingManualInstall {
            staged_file,
            ..
        } => staged_file,
        other => panic!("expected a pending install, got {other:?}"),
    };
    let before = plugin.snapshot();

    std::fs::write(&staged_file, zip_bytes(&[(MAIN_ARTIFACT, b"not what was published")])).unwrap();
    let outcome = manager.install_staged(&staged_file, "1.1.0").await;

    assert!(
        matches!(
            outcome,
            UpdateOutcome::Failed {
                error: UpdateError::Integrity { .. }
            }
        ),
        "{outcome:?}"
    );
    assert_eq!(plugin.snapshot(), before);
    assert_eq!(plugin.backup_count(), 0);
    assert_eq!(plugin.stored_config().current_version, "1.0.0");
    assert!(plugin.staged_files().is_empty(), "tampered file and its record deleted");
}
