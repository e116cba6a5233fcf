//! The persisted update configuration of one installed plugin.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{
    BACKUP_DIR_NAME, DEFAULT_CHECK_INTERVAL_HOURS, DEFAULT_CURRENT_VERSION,
    DEFAULT_HOST_PROCESS_NAME, DEFAULT_SERVER_URL, INSTALLER_EXE_NAME, LOG_DIR_NAME,
    PLACEHOLDER_MAIN_ARTIFACT, PLACEHOLDER_PLUGIN_ID, STAGING_DIR_NAME,
};

/// Update settings for a single plugin installation.
///
/// Stored as TOML next to the plugin (see [`crate::constants::CONFIG_FILE_NAME`]).
/// Missing keys fall back to [`Default`]; a load pass then repairs anything
/// that must not be empty (see [`UpdateConfig::repair`]).
///
/// ```toml
/// server_url = "https://plugins.example.com"
/// plugin_unique_id = "acme-walls"
/// current_version = "1.4.2"
/// check_interval_hours = 24
/// install_target_directory = "C:/ProgramData/Host/Addins/AcmeWalls"
/// main_artifact_file_name = "AcmeWalls.dll"
/// installer_path = "C:/ProgramData/Host/Addins/AcmeWalls/plugin-installer.exe"
/// backup_directory = "C:/ProgramData/Host/Addins/AcmeWalls/Backup"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Base URL of the update server, without a trailing `/api`.
    pub server_url: String,
    /// Identifier the server publishes this plugin under.
    pub plugin_unique_id: String,
    /// Version currently installed.
    pub current_version: String,
    /// Whether the host may run an automatic check at startup.
    pub check_updates_on_startup: bool,
    /// Minimum hours between automatic checks.
    pub check_interval_hours: i64,
    /// When the last successful check finished; `None` if never.
    pub last_check_time: Option<DateTime<Utc>>,
    /// Download automatically when a startup check finds an update.
    pub auto_download: bool,
    /// Install automatically after an automatic download.
    pub auto_install: bool,
    pub show_notifications: bool,
    /// Directory holding the installed plugin files.
    pub install_target_directory: PathBuf,
    /// File name the downloaded artifact is installed as when it is not an archive.
    pub main_artifact_file_name: String,
    /// Path of the standalone installer executable.
    pub installer_path: PathBuf,
    /// Directory receiving timestamped backups of the install target.
    pub backup_directory: PathBuf,
    /// Exact name of the host application process the installer waits for.
    /// Empty disables the wait.
    pub host_process_name: String,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            plugin_unique_id: String::new(),
            current_version: DEFAULT_CURRENT_VERSION.to_string(),
            check_updates_on_startup: true,
            check_interval_hours: DEFAULT_CHECK_INTERVAL_HOURS,
            last_check_time: None,
            auto_download: false,
            auto_install: false,
            show_notifications: true,
            install_target_directory: PathBuf::new(),
            main_artifact_file_name: String::new(),
            installer_path: PathBuf::new(),
            backup_directory: PathBuf::new(),
            host_process_name: DEFAULT_HOST_PROCESS_NAME.to_string(),
        }
    }
}

impl UpdateConfig {
    /// A fresh configuration for a plugin living in `plugin_dir`.
    ///
    /// The plugin id and main artifact name are placeholders that a developer
    /// has to replace before [`is_configuration_valid`](Self::is_configuration_valid)
    /// passes.
    #[must_use]
    pub fn default_for(plugin_dir: &Path) -> Self {
        Self {
            plugin_unique_id: PLACEHOLDER_PLUGIN_ID.to_string(),
            main_artifact_file_name: PLACEHOLDER_MAIN_ARTIFACT.to_string(),
            install_target_directory: plugin_dir.to_path_buf(),
            installer_path: plugin_dir.join(INSTALLER_EXE_NAME),
            backup_directory: plugin_dir.join(BACKUP_DIR_NAME),
            ..Self::default()
        }
    }

    /// Fill required fields that are empty or out of range.
    ///
    /// Returns `true` when anything changed, in which case the caller must
    /// persist the record again.
    pub fn repair(&mut self, plugin_dir: &Path) -> bool {
        let mut changed = false;

        if self.server_url.trim().is_empty() {
            self.server_url = DEFAULT_SERVER_URL.to_string();
            changed = true;
        }

        if self.current_version.trim().is_empty() {
            self.current_version = DEFAULT_CURRENT_VERSION.to_string();
            changed = true;
        }

        if self.check_interval_hours <= 0 {
            self.check_interval_hours = DEFAULT_CHECK_INTERVAL_HOURS;
            changed = true;
        }

        if self.install_target_directory.as_os_str().is_empty() {
            self.install_target_directory = plugin_dir.to_path_buf();
            changed = true;
        }

        if self.installer_path.as_os_str().is_empty() {
            self.installer_path = self.install_target_directory.join(INSTALLER_EXE_NAME);
            changed = true;
        }

        if self.backup_directory.as_os_str().is_empty() {
            self.backup_directory = self.install_target_directory.join(BACKUP_DIR_NAME);
            changed = true;
        }

        changed
    }

    /// Every reason update checking is not allowed to run yet.
    #[must_use]
    pub fn configuration_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.plugin_unique_id.trim().is_empty() || self.plugin_unique_id == PLACEHOLDER_PLUGIN_ID
        {
            issues.push("plugin unique id (plugin_unique_id) is not set".to_string());
        }

        if self.main_artifact_file_name.trim().is_empty()
            || self.main_artifact_file_name == PLACEHOLDER_MAIN_ARTIFACT
        {
            issues.push("main artifact file name (main_artifact_file_name) is not set".to_string());
        }

        if self.server_url.trim().is_empty() {
            issues.push("update server URL (server_url) is not set".to_string());
        }

        if !self.installer_path.is_file() {
            issues.push(format!("installer executable not found: {}", self.installer_path.display()));
        }

        issues
    }

    /// Stricter than the load-time repair: gates whether checks may run at all.
    #[must_use]
    pub fn is_configuration_valid(&self) -> bool {
        self.configuration_issues().is_empty()
    }

    /// Whether an automatic check is due at `now`.
    #[must_use]
    pub fn should_check(&self, now: DateTime<Utc>) -> bool {
        if !self.check_updates_on_startup {
            return false;
        }

        match self.last_check_time {
            None => true,
            // An interval too large to represent is never due
            Some(last) => Duration::try_hours(self.check_interval_hours)
                .is_some_and(|interval| now - last >= interval),
        }
    }

    /// Directory where downloads are staged before installation.
    #[must_use]
    pub fn staging_directory(&self) -> PathBuf {
        self.install_target_directory.join(STAGING_DIR_NAME)
    }

    #[must_use]
    pub fn log_directory(&self) -> PathBuf {
        self.install_target_directory.join(LOG_DIR_NAME)
    }

    /// Base URL with any trailing slash removed.
    #[must_use]
    pub fn server_base(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }
}
