//! Shared fixtures for the integration suite
//!
//! - [`TestPlugin`] - an installed plugin in a temp directory with a valid config
//! - [`spawn_registry`] - the in-memory registry on an ephemeral port

// Not every test file uses every helper
#![allow(dead_code)]

use plugin_updater::config::{ConfigService, ConfigStore, FileConfigStore, UpdateConfig};
use plugin_updater::constants::{CONFIG_FILE_NAME, INSTALLER_EXE_NAME};
use plugin_updater::installer::Installer;
use plugin_updater::installer::quiescence::HostProbe;
use plugin_updater::registry::{PluginRegistry, spawn_server};
use plugin_updater::update::{InstallMode, UpdateManager};
use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const PLUGIN_ID: &str = "acme-walls";
pub const MAIN_ARTIFACT: &str = "AcmeWalls.dll";

/// Host probe that never sees the host running.
pub struct NoHost;

impl HostProbe for NoHost {
    fn is_running(&mut self, _process_name: &str) -> bool {
        false
    }
}

/// Start the registry on `127.0.0.1:0` and return it with its base URL.
pub async fn spawn_registry() -> (Arc<PluginRegistry>, String) {
    let registry = Arc::new(PluginRegistry::new());
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let (local, _handle) = spawn_server(Arc::clone(&registry), addr).await.unwrap();
    (registry, format!("http://{local}"))
}

/// A plugin installed at version 1.0.0 in a temp directory.
pub struct TestPlugin {
    _temp: TempDir,
    pub dir: PathBuf,
}

impl TestPlugin {
    pub fn new(server_url: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("AcmeWalls");
        fs::create_dir_all(dir.join("resources")).unwrap();
        fs::write(dir.join(MAIN_ARTIFACT), b"acme v1.0.0").unwrap();
        fs::write(dir.join("resources").join("strings.json"), br#"{"title":"Acme"}"#).unwrap();
        fs::write(dir.join(INSTALLER_EXE_NAME), b"placeholder installer").unwrap();

        let config = UpdateConfig {
            server_url: server_url.to_string(),
            plugin_unique_id: PLUGIN_ID.to_string(),
            main_artifact_file_name: MAIN_ARTIFACT.to_string(),
            host_process_name: String::new(),
            ..UpdateConfig::default_for(&dir)
        };
        FileConfigStore::new(dir.join(CONFIG_FILE_NAME)).save(&config).unwrap();

        Self {
            _temp: temp,
            dir,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    pub fn stored_config(&self) -> UpdateConfig {
        FileConfigStore::new(self.config_path()).load().unwrap().unwrap()
    }

    pub fn edit_config(&self, edit: impl FnOnce(&mut UpdateConfig)) {
        let mut config = self.stored_config();
        edit(&mut config);
        FileConfigStore::new(self.config_path()).save(&config).unwrap();
    }

    /// Manager installing in-process with no host to wait for.
    pub fn manager(&self) -> UpdateManager {
        let service =
            ConfigService::open(Box::new(FileConfigStore::new(self.config_path())), &self.dir)
                .unwrap();
        let installer = Installer::new(Box::new(NoHost));
        UpdateManager::new(service, InstallMode::InProcess(installer)).unwrap()
    }

    /// Plugin files only: config, backups, staging and logs are left out.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        plugin_updater::test_utils::snapshot_tree(
            &self.dir,
            &["Backup", "Temp", "Logs", CONFIG_FILE_NAME],
        )
    }

    pub fn backup_count(&self) -> usize {
        let root = self.dir.join("Backup");
        if !root.exists() {
            return 0;
        }
        fs::read_dir(root).unwrap().count()
    }

    pub fn staged_files(&self) -> Vec<PathBuf> {
        let staging = self.dir.join("Temp");
        if !staging.exists() {
            return Vec::new();
        }
        fs::read_dir(staging).unwrap().map(|e| e.unwrap().path()).collect()
    }

    pub fn read(&self, relative: impl AsRef<Path>) -> Vec<u8> {
        fs::read(self.dir.join(relative)).unwrap()
    }
}
