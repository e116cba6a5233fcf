//! The handoff record between the host side and the installer process.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::utils::fs::atomic_write;

/// Everything the installer needs to apply one staged download.
///
/// Written once by the host, read once by the installer, then deleted by
/// the installer. Serialized as camelCase JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallInstruction {
    /// Verified artifact in the staging directory.
    pub source_file: PathBuf,
    pub target_directory: PathBuf,
    pub main_artifact_file_name: String,
    pub new_version: String,
    pub backup_directory: PathBuf,
    pub log_file: PathBuf,
    /// Host process to wait for; absent or empty skips the wait.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_process_name: Option<String>,
    /// Installer executable; left untouched by backup, replace and restore
    /// since a running executable may not be removable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer_path: Option<PathBuf>,
    /// Update config to record `new_version` in after a successful install.
    /// Set when nobody waits for the installer's exit code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

impl InstallInstruction {
    pub fn write(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_vec_pretty(self).context("Failed to serialize install instruction")?;
        atomic_write(path, &json)
            .with_context(|| format!("Failed to write install instruction to {}", path.display()))?;
        debug!("Wrote install instruction to {}", path.display());
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read(path)
            .with_context(|| format!("Failed to read install instruction {}", path.display()))?;
        serde_json::from_slice(&content)
            .with_context(|| format!("Failed to parse install instruction {}", path.display()))
    }

    /// Remove a consumed instruction file. Missing files are not an error.
    pub fn delete(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to delete install instruction {}", path.display())),
        }
    }

    /// Host process name with empty values treated as absent.
    #[must_use]
    pub fn host_process(&self) -> Option<&str> {
        self.host_process_name.as_deref().map(str::trim).filter(|name| !name.is_empty())
    }
}
