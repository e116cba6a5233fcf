use chrono::{DateTime, Utc};
use reqwest::Client;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::{
    ChecksumVerifier, Downloader, InstallInstruction, ProgressSender, UpdateChecker,
    VersionDescriptor, http_client,
};
use crate::config::{ConfigService, UpdateConfig};
use crate::constants::{EXIT_INSTALLED, EXIT_ROLLED_BACK, INSTRUCTION_FILE_NAME};
use crate::core::UpdateError;
use crate::installer::{InstallOutcome, Installer};
use crate::logging::daily_log_path;

/// Terminal result of a download-and-install request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The new version is in place and recorded as current.
    Installed {
        version: String,
    },
    /// Replacement failed and the previous files were restored.
    RolledBack {
        version: String,
        error: UpdateError,
    },
    Failed {
        error: UpdateError,
    },
    /// Downloaded and verified but not installed; confirm with
    /// [`UpdateManager::install_staged`].
    PendingManualInstall {
        version: String,
        staged_file: PathBuf,
    },
    /// Handed to a detached installer that records the version itself once
    /// the files are replaced.
    InstallScheduled {
        version: String,
    },
}

impl UpdateOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Installed { .. } | Self::PendingManualInstall { .. } | Self::InstallScheduled { .. }
        )
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installed {
                version,
            } => write!(f, "Installed version {version}"),
            Self::RolledBack {
                version,
                error,
            } => write!(f, "Install of {version} was rolled back: {error}"),
            Self::Failed {
                error,
            } => write!(f, "Update failed: {error}"),
            Self::PendingManualInstall {
                version,
                staged_file,
            } => write!(f, "Version {version} downloaded to {}; install pending", staged_file.display()),
            Self::InstallScheduled {
                version,
            } => write!(f, "Version {version} will be installed once the host exits"),
        }
    }
}

/// What an automatic startup check did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupCheck {
    /// Configuration is incomplete; checking is disabled.
    NotConfigured,
    /// Disabled, or the check interval has not elapsed.
    NotDue,
    UpToDate,
    /// An update exists and automatic download is off.
    Available(VersionDescriptor),
    /// An update was downloaded automatically.
    Updated(UpdateOutcome),
    /// The check failed. Startup failures are logged, never shown.
    CheckFailed(UpdateError),
}

/// How verified downloads are applied.
pub enum InstallMode {
    /// Run the installer state machine inside this process.
    InProcess(Installer),
    /// Hand an instruction file to the configured installer executable and
    /// map its exit code.
    ///
    /// Waits for the installer, which in turn waits up to two minutes for the
    /// host to exit. Use [`InstallMode::Detached`] when the caller runs
    /// inside the host.
    External,
    /// Start the installer executable and return without waiting. The
    /// installer records the new version in the config file itself.
    Detached,
}

/// Drives check, download and install for one plugin.
///
/// Owns the HTTP client; it is dropped with the manager.
pub struct UpdateManager {
    config: ConfigService,
    client: Client,
    mode: InstallMode,
}

impl UpdateManager {
    pub fn new(config: ConfigService, mode: InstallMode) -> anyhow::Result<Self> {
        Ok(Self {
            config,
            client: http_client()?,
            mode,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &UpdateConfig {
        self.config.config()
    }

    fn checker(&self) -> UpdateChecker {
        let config = self.config();
        UpdateChecker::new(self.client.clone(), config.server_base(), &config.plugin_unique_id)
    }

    fn downloader(&self) -> Downloader {
        let config = self.config();
        Downloader::new(self.client.clone(), config.server_base(), &config.plugin_unique_id)
    }

    fn ensure_configured(&self) -> Result<(), UpdateError> {
        let issues = self.config().configuration_issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(UpdateError::Configuration {
                issues,
            })
        }
    }

    /// Ask the server whether a newer version exists.
    ///
    /// Records the check time after a successful round-trip.
    ///
    /// # Errors
    ///
    /// [`UpdateError::Configuration`] when the configuration is incomplete, or
    /// [`UpdateError::Transport`] when the server cannot be reached.
    pub async fn check_for_updates(&mut self) -> Result<Option<VersionDescriptor>, UpdateError> {
        self.ensure_configured()?;

        let current = self.config().current_version.clone();
        let result = self.checker().check(&current).await;
        if let Err(e) = &result {
            if e.is_retryable() {
                warn!(kind = e.kind(), "Update check failed; retrying at the next scheduled check: {e}");
            } else {
                error!(kind = e.kind(), "Update check failed: {e}");
            }
            return result;
        }

        if let Err(e) = self.config.mark_checked(Utc::now()) {
            warn!("Failed to record check time: {e:#}");
        }
        result
    }

    /// The automatic check run when the host starts.
    ///
    /// Gated by configuration validity and the check interval. Failures are
    /// returned for logging but never surfaced to the user.
    pub async fn startup_check(
        &mut self,
        now: DateTime<Utc>,
        progress: Option<ProgressSender>,
    ) -> StartupCheck {
        if !self.config().is_configuration_valid() {
            debug!("Skipping startup check: configuration incomplete");
            return StartupCheck::NotConfigured;
        }

        if !self.config().should_check(now) {
            debug!("Skipping startup check: not due");
            return StartupCheck::NotDue;
        }

        let descriptor = match self.check_for_updates().await {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) => return StartupCheck::UpToDate,
            Err(e) => return StartupCheck::CheckFailed(e),
        };

        if !self.config().auto_download {
            return StartupCheck::Available(descriptor);
        }

        let auto_install = self.config().auto_install;
        StartupCheck::Updated(self.download_and_install(&descriptor, auto_install, progress).await)
    }

    /// Download and verify `descriptor`, then install it or leave it staged.
    pub async fn download_and_install(
        &mut self,
        descriptor: &VersionDescriptor,
        auto_install: bool,
        progress: Option<ProgressSender>,
    ) -> UpdateOutcome {
        let staging = self.config().staging_directory();
        let staged = match self.downloader().download(descriptor, &staging, progress).await {
            Ok(path) => path,
            Err(error) => {
                error!(kind = error.kind(), version = %descriptor.version, "Download failed: {error}");
                return UpdateOutcome::Failed {
                    error,
                };
            }
        };

        if !auto_install {
            info!("Version {} staged at {}", descriptor.version, staged.display());
            return UpdateOutcome::PendingManualInstall {
                version: descriptor.version.clone(),
                staged_file: staged,
            };
        }

        self.install_staged(&staged, &descriptor.version).await
    }

    /// Install a previously staged, verified file as `version`.
    ///
    /// The file is checked again against the descriptor recorded when it was
    /// downloaded, so a file changed while staged or staged under another
    /// version is refused. On success the configuration records `version` as
    /// current.
    pub async fn install_staged(&mut self, staged_file: &Path, version: &str) -> UpdateOutcome {
        if let Err(error) = reverify_staged(staged_file, version).await {
            error!(kind = error.kind(), %version, "Refusing to install {}: {error}", staged_file.display());
            return UpdateOutcome::Failed {
                error,
            };
        }

        let detached = matches!(self.mode, InstallMode::Detached);
        let mut instruction = self.instruction_for(staged_file, version);
        if detached {
            instruction.config_file = self.config.file_path();
        }

        let outcome = match &mut self.mode {
            InstallMode::InProcess(installer) => {
                let report = installer.run(&instruction).await;
                match report.outcome().clone() {
                    InstallOutcome::Installed => UpdateOutcome::Installed {
                        version: version.to_string(),
                    },
                    InstallOutcome::RolledBack(error) => UpdateOutcome::RolledBack {
                        version: version.to_string(),
                        error,
                    },
                    InstallOutcome::Failed(error) => UpdateOutcome::Failed {
                        error,
                    },
                }
            }
            InstallMode::External => {
                let installer_path = self.config.config().installer_path.clone();
                let staging = self.config.config().staging_directory();
                run_external_installer(&installer_path, &staging, &instruction).await
            }
            InstallMode::Detached => {
                let installer_path = self.config.config().installer_path.clone();
                let staging = self.config.config().staging_directory();
                spawn_detached_installer(&installer_path, &staging, &instruction)
            }
        };

        match &outcome {
            UpdateOutcome::Installed {
                ..
            } => {
                if let Err(e) = self.config.set_current_version(version) {
                    error!("Installed {version} but failed to record it: {e:#}");
                }
            }
            UpdateOutcome::RolledBack {
                error,
                ..
            }
            | UpdateOutcome::Failed {
                error,
            } => {
                error!(kind = error.kind(), %version, "Install did not complete: {error}");
            }
            UpdateOutcome::InstallScheduled {
                ..
            } => info!(%version, "Installer started; it finishes after the host exits"),
            UpdateOutcome::PendingManualInstall {
                ..
            } => {}
        }

        outcome
    }

    fn instruction_for(&self, staged_file: &Path, version: &str) -> InstallInstruction {
        let config = self.config();
        let host = config.host_process_name.trim();
        InstallInstruction {
            source_file: staged_file.to_path_buf(),
            target_directory: config.install_target_directory.clone(),
            main_artifact_file_name: config.main_artifact_file_name.clone(),
            new_version: version.to_string(),
            backup_directory: config.backup_directory.clone(),
            log_file: daily_log_path(&config.log_directory(), "installer"),
            host_process_name: (!host.is_empty()).then(|| host.to_string()),
            installer_path: Some(config.installer_path.clone()),
            config_file: None,
        }
    }
}

/// Check `staged_file` against the descriptor recorded at download time.
///
/// A file whose hash no longer matches is deleted along with its record.
async fn reverify_staged(staged_file: &Path, version: &str) -> Result<(), UpdateError> {
    let record = VersionDescriptor::read_record(staged_file).map_err(|e| UpdateError::Other {
        message: format!("{e:#}; download the update again"),
    })?;

    if record.version != version {
        return Err(UpdateError::Other {
            message: format!(
                "{} was downloaded as version {}, not {version}",
                staged_file.display(),
                record.version
            ),
        });
    }

    if let Err(e) = ChecksumVerifier::verify_checksum(staged_file, &record.file_hash).await {
        if matches!(e, UpdateError::Integrity { .. }) {
            for path in [staged_file.to_path_buf(), VersionDescriptor::record_path(staged_file)] {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!("Failed to delete {}: {e}", path.display());
                }
            }
        }
        return Err(e);
    }
    Ok(())
}

fn write_instruction_file(staging: &Path, instruction: &InstallInstruction) -> Result<PathBuf, UpdateError> {
    let instruction_path = staging.join(INSTRUCTION_FILE_NAME);
    instruction.write(&instruction_path).map_err(|e| UpdateError::Other {
        message: format!("{e:#}"),
    })?;
    Ok(instruction_path)
}

/// Start the installer and return at once. The instruction file stays for
/// the installer, which deletes it.
fn spawn_detached_installer(
    installer_path: &Path,
    staging: &Path,
    instruction: &InstallInstruction,
) -> UpdateOutcome {
    let instruction_path = match write_instruction_file(staging, instruction) {
        Ok(path) => path,
        Err(error) => {
            return UpdateOutcome::Failed {
                error,
            };
        }
    };

    info!("Starting detached installer {}", installer_path.display());
    match std::process::Command::new(installer_path).arg(&instruction_path).spawn() {
        Ok(child) => {
            debug!(pid = child.id(), "Installer running");
            UpdateOutcome::InstallScheduled {
                version: instruction.new_version.clone(),
            }
        }
        Err(e) => {
            if let Err(e) = InstallInstruction::delete(&instruction_path) {
                warn!("{e:#}");
            }
            UpdateOutcome::Failed {
                error: UpdateError::Other {
                    message: format!("Failed to start installer {}: {e}", installer_path.display()),
                },
            }
        }
    }
}

async fn run_external_installer(
    installer_path: &Path,
    staging: &Path,
    instruction: &InstallInstruction,
) -> UpdateOutcome {
    let instruction_path = match write_instruction_file(staging, instruction) {
        Ok(path) => path,
        Err(error) => {
            return UpdateOutcome::Failed {
                error,
            };
        }
    };

    info!("Starting installer {}", installer_path.display());
    let status = tokio::process::Command::new(installer_path).arg(&instruction_path).status().await;

    // The installer deletes it; this only covers an installer that never ran
    if let Err(e) = InstallInstruction::delete(&instruction_path) {
        warn!("{e:#}");
    }

    let version = instruction.new_version.clone();
    let target = instruction.target_directory.display().to_string();
    match status {
        Ok(status) if status.code() == Some(EXIT_INSTALLED) => UpdateOutcome::Installed {
            version,
        },
        Ok(status) if status.code() == Some(EXIT_ROLLED_BACK) => UpdateOutcome::RolledBack {
            error: UpdateError::Install {
                version: version.clone(),
                target,
                reason: format!("installer rolled back; see {}", instruction.log_file.display()),
                rollback_error: None,
            },
            version,
        },
        Ok(status) => UpdateOutcome::Failed {
            error: UpdateError::Install {
                version,
                target,
                reason: format!(
                    "installer exited with {status}; see {}",
                    instruction.log_file.display()
                ),
                rollback_error: None,
            },
        },
        Err(e) => UpdateOutcome::Failed {
            error: UpdateError::Other {
                message: format!("Failed to start installer {}: {e}", installer_path.display()),
            },
        },
    }
}
