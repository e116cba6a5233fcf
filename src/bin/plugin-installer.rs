//! `plugin-installer` - applies one staged update once the host has exited.
//!
//! Invoked with the path of an install instruction file. The instruction is
//! always deleted, whatever the outcome. Exit codes: 0 installed, 1 failed,
//! 2 rolled back.
//!
//! When the instruction names a config file, nobody waits for the exit code,
//! so a successful install records the new version there.

use clap::Parser;
use colored::Colorize;
use plugin_updater::config::{ConfigStore, FileConfigStore};
use plugin_updater::constants::EXIT_FAILED;
use plugin_updater::installer::quiescence::SystemHostProbe;
use plugin_updater::installer::{InstallOutcome, Installer};
use plugin_updater::logging::{init_logging, level_for};
use plugin_updater::update::InstallInstruction;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "plugin-installer", version, about = "Install a staged plugin update")]
struct Args {
    /// Install instruction written by the updater.
    #[arg(value_name = "INSTRUCTION")]
    instruction: PathBuf,

    /// Enable debug output.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    std::process::exit(run(args).await);
}

async fn run(args: Args) -> i32 {
    let mut instruction = match InstallInstruction::read(&args.instruction) {
        Ok(instruction) => instruction,
        Err(e) => {
            init_logging(level_for(args.verbose, false), None);
            error!("{e:#}");
            eprintln!("{}: {e:#}", "error".red().bold());
            discard(&args.instruction);
            return EXIT_FAILED;
        }
    };

    init_logging(level_for(args.verbose, false), Some(&instruction.log_file));
    info!("Installer started for version {}", instruction.new_version);

    // This executable may sit inside the target and cannot replace itself
    if instruction.installer_path.is_none() {
        instruction.installer_path = std::env::current_exe().ok();
    }

    let mut installer = Installer::new(Box::new(SystemHostProbe::new()));
    let report = installer.run(&instruction).await;
    discard(&args.instruction);

    match report.outcome() {
        InstallOutcome::Installed => {
            println!("{}", format!("Installed version {}", report.version).green());
            if let Some(config_file) = &instruction.config_file {
                if let Err(e) = record_version(config_file, &report.version) {
                    error!("Installed {} but failed to record it: {e:#}", report.version);
                }
            }
        }
        InstallOutcome::RolledBack(e) => {
            eprintln!("{}: {e}", "rolled back".yellow().bold());
        }
        InstallOutcome::Failed(e) => {
            eprintln!("{}: {e}", "error".red().bold());
        }
    }

    report.exit_code()
}

fn record_version(config_file: &Path, version: &str) -> anyhow::Result<()> {
    let store = FileConfigStore::new(config_file);
    let Some(mut config) = store.load()? else {
        anyhow::bail!("Update config not found: {}", config_file.display());
    };
    config.current_version = version.to_string();
    store.save(&config)?;
    info!("Recorded version {version} in {}", config_file.display());
    Ok(())
}

fn discard(path: &Path) {
    if let Err(e) = InstallInstruction::delete(path) {
        warn!("{e:#}");
    }
}
