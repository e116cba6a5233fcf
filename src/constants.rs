//! Global constants used throughout the updater.
//!
//! Timeouts, retention limits, and the default file and directory names that
//! the host client and the installer agree on.

use std::time::Duration;

/// Overall timeout for a single HTTP exchange with the update server.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Maximum time the installer waits for the host application to exit.
pub const HOST_QUIESCENCE_TIMEOUT: Duration = Duration::from_secs(120);

/// Interval between host-process presence checks.
pub const HOST_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Number of backups kept after a successful install.
pub const BACKUP_RETENTION: usize = 5;

/// Prefix shared by every backup directory name.
pub const BACKUP_PREFIX: &str = "backup_";

/// Default config file name inside the plugin directory.
pub const CONFIG_FILE_NAME: &str = "update-config.toml";

/// Name of the serialized install instruction inside the staging directory.
pub const INSTRUCTION_FILE_NAME: &str = "update_instructions.json";

pub const STAGING_DIR_NAME: &str = "Temp";

pub const BACKUP_DIR_NAME: &str = "Backup";

pub const LOG_DIR_NAME: &str = "Logs";

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

pub const DEFAULT_CURRENT_VERSION: &str = "1.0.0";

pub const DEFAULT_CHECK_INTERVAL_HOURS: i64 = 24;

/// Placeholder values written into a fresh config; they must be replaced
/// before update checks are allowed.
pub const PLACEHOLDER_PLUGIN_ID: &str = "your-plugin-unique-id";

pub const PLACEHOLDER_MAIN_ARTIFACT: &str = "YourPlugin.dll";

pub const DEFAULT_HOST_PROCESS_NAME: &str = "Revit";

#[cfg(windows)]
pub const INSTALLER_EXE_NAME: &str = "plugin-installer.exe";

#[cfg(not(windows))]
pub const INSTALLER_EXE_NAME: &str = "plugin-installer";

/// Installer process exit codes.
pub const EXIT_INSTALLED: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ROLLED_BACK: i32 = 2;
