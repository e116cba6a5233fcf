//! Command-line interface for the host-side updater
//!
//! # Commands
//!
//! - `check` - ask the server whether a newer version exists (errors are reported)
//! - `update` - check, download, verify and install (or stage with `--no-install`)
//! - `install <FILE> <VERSION>` - install a previously staged download
//! - `status` - show the configuration, what still needs a value, and backups
//! - `prune` - apply backup retention
//! - `serve` - run the in-memory registry with published artifacts
//!
//! # Global Options
//!
//! - `--plugin-dir` - plugin directory (env `PLUGIN_UPDATER_DIR`, default: current directory)
//! - `--config` - config file (default: `<plugin-dir>/update-config.toml`)
//! - `--verbose` / `--quiet` - log level
//! - `--no-progress` - hide the download progress bar
//!
//! ```bash
//! plugin-updater --plugin-dir "C:/ProgramData/Host/Addins/Acme" check
//! plugin-updater update --no-install
//! plugin-updater install Temp/update_1.2.0_5f2c.zip 1.2.0
//! plugin-updater serve --publish acme:1.2.0:dist/Acme.zip
//! ```

mod check;
mod install;
mod serve;
mod status;
mod update;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{ConfigService, FileConfigStore};
use crate::constants::CONFIG_FILE_NAME;
use crate::installer::Installer;
use crate::installer::quiescence::SystemHostProbe;
use crate::logging::{daily_log_path, init_logging, level_for};
use crate::update::{InstallMode, ProgressSender, UpdateManager};
use crate::utils::DownloadProgressBar;

/// Host-side update client for an installed plugin.
#[derive(Parser)]
#[command(
    name = "plugin-updater",
    about = "Check, download, verify and install plugin updates",
    version,
    long_about = "Keeps an installed plugin current: checks the update server, downloads and verifies \
                  new versions, and installs them with a backup and automatic rollback."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Plugin directory holding the installed files and the update config.
    #[arg(long, global = true, env = "PLUGIN_UPDATER_DIR")]
    plugin_dir: Option<PathBuf>,

    /// Path to the update config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Hide the download progress bar.
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the server for a newer version
    Check,
    /// Download and install the latest version
    Update(update::UpdateArgs),
    /// Install a downloaded file that is waiting in the staging directory
    Install(install::InstallArgs),
    /// Show configuration, outstanding issues and backups
    Status,
    /// Delete old backups beyond the retention limit
    Prune,
    /// Run the in-memory registry server
    Serve(serve::ServeArgs),
}

/// Resolved global options shared by every command.
pub struct CliContext {
    pub plugin_dir: PathBuf,
    pub config_path: PathBuf,
    pub show_progress: bool,
}

impl CliContext {
    /// Load (or create) the update config.
    pub fn open_config(&self) -> Result<ConfigService> {
        ConfigService::open(Box::new(FileConfigStore::new(&self.config_path)), &self.plugin_dir)
    }

    /// Update manager installing through the external installer, or in this
    /// process when `in_process` is set. With `detach` the installer is
    /// started without waiting for it.
    pub fn manager(&self, in_process: bool, detach: bool) -> Result<UpdateManager> {
        let mode = if in_process {
            InstallMode::InProcess(Installer::new(Box::new(SystemHostProbe::new())))
        } else if detach {
            InstallMode::Detached
        } else {
            InstallMode::External
        };
        UpdateManager::new(self.open_config()?, mode)
    }

    /// Progress channel rendered as a terminal bar.
    pub fn progress(&self, label: &str) -> (ProgressSender, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(32);
        let handle = DownloadProgressBar::new(label.to_string(), self.show_progress).track(rx);
        (tx, handle)
    }
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let plugin_dir = match self.plugin_dir {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        let config_path = self.config.unwrap_or_else(|| plugin_dir.join(CONFIG_FILE_NAME));

        let log_file = match self.command {
            Commands::Serve(_) => None,
            _ => Some(log_file_for(&plugin_dir)),
        };
        init_logging(level_for(self.verbose, self.quiet), log_file.as_deref());

        let ctx = CliContext {
            plugin_dir,
            config_path,
            show_progress: !self.no_progress && !self.quiet,
        };

        match self.command {
            Commands::Check => check::execute(&ctx).await,
            Commands::Update(args) => update::execute(&ctx, args).await,
            Commands::Install(args) => install::execute(&ctx, args).await,
            Commands::Status => status::execute(&ctx),
            Commands::Prune => status::prune(&ctx),
            Commands::Serve(args) => serve::execute(args).await,
        }
    }
}

fn log_file_for(plugin_dir: &Path) -> PathBuf {
    daily_log_path(&plugin_dir.join(crate::constants::LOG_DIR_NAME), "updater")
}
