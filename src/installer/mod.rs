//! Applies a staged, verified download to the plugin directory.
//!
//! The installer runs as a state machine:
//!
//! ```text
//! Idle -> WaitingForHostQuiescence -> BackingUp -> Replacing -> Installed
//!                                         |            |
//!                                         v            v
//!                                       Failed     RolledBack (or Failed if
//!                                                  the rollback fails too)
//! ```
//!
//! - **Idle**: the source file and target directory must exist, and the
//!   artifact must be a ZIP or a single file. Other archive types fail here,
//!   before anything on disk is touched.
//! - **WaitingForHostQuiescence**: polls for the host process and proceeds
//!   once it is gone, or after the timeout with a warning.
//! - **BackingUp**: a full recursive copy of the target. If it fails, no
//!   file is replaced.
//! - **Replacing**: ZIP archives are extracted over the target; other files
//!   replace the main artifact. A failure restores the backup taken in this
//!   run.
//! - **Installed**: the staged file and its download record are deleted and
//!   old backups are pruned.
//!
//! Every run returns an [`InstallReport`] holding the states visited and the
//! outcome; nothing is thrown past [`Installer::run`].

pub mod backup;
pub mod quiescence;
pub mod replace;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::constants::{
    EXIT_FAILED, EXIT_INSTALLED, EXIT_ROLLED_BACK, HOST_POLL_INTERVAL, HOST_QUIESCENCE_TIMEOUT,
};
use crate::core::UpdateError;
use crate::update::{InstallInstruction, VersionDescriptor};
use backup::BackupManager;
use quiescence::{HostProbe, wait_for_host_exit};
use replace::{ArtifactKind, replace_artifact};

/// States of one install cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Idle,
    WaitingForHostQuiescence,
    BackingUp,
    Replacing,
    Installed,
    RolledBack,
    Failed,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::WaitingForHostQuiescence => "waiting for host to exit",
            Self::BackingUp => "backing up",
            Self::Replacing => "replacing",
            Self::Installed => "installed",
            Self::RolledBack => "rolled back",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Terminal result of an install cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    /// Replacement failed and the previous files were restored.
    RolledBack(UpdateError),
    Failed(UpdateError),
}

/// What happened during [`Installer::run`].
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub version: String,
    /// States in the order they were entered, starting with `Idle`.
    pub states: Vec<InstallState>,
    /// Backup created for this cycle, if one was made.
    pub backup: Option<PathBuf>,
    outcome: InstallOutcome,
}

impl InstallReport {
    #[must_use]
    pub const fn outcome(&self) -> &InstallOutcome {
        &self.outcome
    }

    /// Process exit code for the standalone installer.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self.outcome {
            InstallOutcome::Installed => EXIT_INSTALLED,
            InstallOutcome::RolledBack(_) => EXIT_ROLLED_BACK,
            InstallOutcome::Failed(_) => EXIT_FAILED,
        }
    }

    #[must_use]
    pub fn reached(&self, state: InstallState) -> bool {
        self.states.contains(&state)
    }

    #[must_use]
    pub fn final_state(&self) -> InstallState {
        self.states.last().copied().unwrap_or(InstallState::Idle)
    }

    #[must_use]
    pub const fn error(&self) -> Option<&UpdateError> {
        match &self.outcome {
            InstallOutcome::Installed => None,
            InstallOutcome::RolledBack(e) | InstallOutcome::Failed(e) => Some(e),
        }
    }
}

/// Runs install cycles against the plugin directory named in an instruction.
pub struct Installer {
    probe: Box<dyn HostProbe>,
    quiescence_timeout: Duration,
    poll_interval: Duration,
}

impl Installer {
    pub fn new(probe: Box<dyn HostProbe>) -> Self {
        Self {
            probe,
            quiescence_timeout: HOST_QUIESCENCE_TIMEOUT,
            poll_interval: HOST_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub const fn with_wait(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.quiescence_timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    /// Run one install cycle. Never fails; the result is in the report.
    pub async fn run(&mut self, instruction: &InstallInstruction) -> InstallReport {
        let mut cycle = Cycle::new(instruction);
        info!(
            "Installing {} from {} into {}",
            instruction.new_version,
            instruction.source_file.display(),
            instruction.target_directory.display()
        );

        // Idle
        if let Err(e) = validate(instruction) {
            return cycle.fail(e);
        }

        // WaitingForHostQuiescence
        cycle.enter(InstallState::WaitingForHostQuiescence);
        if let Some(host) = instruction.host_process() {
            wait_for_host_exit(self.probe.as_mut(), host, self.quiescence_timeout, self.poll_interval)
                .await;
        }

        // BackingUp
        cycle.enter(InstallState::BackingUp);
        let target = &instruction.target_directory;
        let backups = BackupManager::new(instruction.backup_directory.clone());
        let keep = preserved_paths(instruction);
        let backup = match backups.create_backup(target, &keep) {
            Ok(path) => path,
            Err(e) => return cycle.fail(e),
        };
        cycle.backup = Some(backup.clone());

        // Replacing
        cycle.enter(InstallState::Replacing);
        if let Err(e) = replace_artifact(
            &instruction.source_file,
            target,
            &instruction.main_artifact_file_name,
        ) {
            let reason = format!("{e:#}");
            error!("Replacement failed: {reason}");
            return match backups.restore_from(&backup, target, &keep) {
                Ok(()) => cycle.rolled_back(install_error(instruction, reason, None)),
                Err(rollback) => {
                    let rollback = format!("{rollback:#}");
                    error!("Rollback failed: {rollback}");
                    cycle.fail(install_error(instruction, reason, Some(rollback)))
                }
            };
        }

        // Installed
        let record = VersionDescriptor::record_path(&instruction.source_file);
        for staged in [&instruction.source_file, &record] {
            if staged.exists() {
                if let Err(e) = std::fs::remove_file(staged) {
                    warn!("Failed to delete staged file {}: {e}", staged.display());
                }
            }
        }
        if let Err(e) = backups.prune() {
            warn!("Failed to prune old backups: {e:#}");
        }

        cycle.installed()
    }
}

fn validate(instruction: &InstallInstruction) -> Result<(), UpdateError> {
    if !instruction.source_file.is_file() {
        return Err(UpdateError::Other {
            message: format!("Source file not found: {}", instruction.source_file.display()),
        });
    }

    if !instruction.target_directory.is_dir() {
        return Err(UpdateError::Other {
            message: format!(
                "Target directory not found: {}",
                instruction.target_directory.display()
            ),
        });
    }

    if let ArtifactKind::UnsupportedArchive(extension) =
        ArtifactKind::from_path(&instruction.source_file)
    {
        return Err(UpdateError::UnsupportedFormat {
            file: instruction.source_file.display().to_string(),
            extension,
        });
    }

    Ok(())
}

/// Paths inside the target that belong to the updater rather than the plugin.
///
/// They are left out of backups and survive a rollback.
fn preserved_paths(instruction: &InstallInstruction) -> Vec<PathBuf> {
    let mut paths = vec![instruction.source_file.clone()];
    for path in [&instruction.source_file, &instruction.log_file] {
        if let Some(parent) = path.parent().filter(|p| *p != instruction.target_directory) {
            paths.push(parent.to_path_buf());
        }
    }
    paths.push(instruction.log_file.clone());
    paths.extend(instruction.installer_path.iter().cloned());
    paths
}

fn install_error(
    instruction: &InstallInstruction,
    reason: String,
    rollback_error: Option<String>,
) -> UpdateError {
    UpdateError::Install {
        version: instruction.new_version.clone(),
        target: instruction.target_directory.display().to_string(),
        reason,
        rollback_error,
    }
}

struct Cycle {
    version: String,
    states: Vec<InstallState>,
    backup: Option<PathBuf>,
}

impl Cycle {
    fn new(instruction: &InstallInstruction) -> Self {
        Self {
            version: instruction.new_version.clone(),
            states: vec![InstallState::Idle],
            backup: None,
        }
    }

    fn enter(&mut self, state: InstallState) {
        info!("Installer state: {state}");
        self.states.push(state);
    }

    fn finish(mut self, state: InstallState, outcome: InstallOutcome) -> InstallReport {
        self.enter(state);
        InstallReport {
            version: self.version,
            states: self.states,
            backup: self.backup,
            outcome,
        }
    }

    fn installed(self) -> InstallReport {
        info!("Version {} installed", self.version);
        self.finish(InstallState::Installed, InstallOutcome::Installed)
    }

    fn rolled_back(self, error: UpdateError) -> InstallReport {
        warn!("Install rolled back: {error}");
        self.finish(InstallState::RolledBack, InstallOutcome::RolledBack(error))
    }

    fn fail(self, error: UpdateError) -> InstallReport {
        error!(kind = error.kind(), "Install failed: {error}");
        self.finish(InstallState::Failed, InstallOutcome::Failed(error))
    }
}
