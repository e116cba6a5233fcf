use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::CliContext;
use crate::update::UpdateOutcome;

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Download and verify only; install later with `plugin-updater install`.
    #[arg(long)]
    pub no_install: bool,

    /// Install in this process instead of launching the installer executable.
    #[arg(long, conflicts_with = "detach")]
    pub in_process: bool,

    /// Start the installer and return without waiting; it finishes once the
    /// host exits and records the version itself.
    #[arg(long)]
    pub detach: bool,
}

pub async fn execute(ctx: &CliContext, args: UpdateArgs) -> Result<()> {
    let mut manager = ctx.manager(args.in_process, args.detach)?;

    let Some(latest) = manager.check_for_updates().await? else {
        println!(
            "{}",
            format!("You are on the latest version ({})", manager.config().current_version).green()
        );
        return Ok(());
    };

    println!("{}", format!("Downloading version {}...", latest.version).cyan());
    let (progress, bar) = ctx.progress(&latest.version);
    let outcome = manager.download_and_install(&latest, !args.no_install, Some(progress)).await;
    let _ = bar.await;

    report(outcome)
}

/// Print an outcome; anything other than success becomes the command's error.
pub fn report(outcome: UpdateOutcome) -> Result<()> {
    match outcome {
        UpdateOutcome::Installed {
            version,
        } => {
            println!("{}", format!("Installed version {version}").green());
            Ok(())
        }
        UpdateOutcome::PendingManualInstall {
            version,
            staged_file,
        } => {
            println!("{}", format!("Version {version} downloaded and verified").green());
            println!(
                "Install it with: plugin-updater install \"{}\" {version}",
                staged_file.display()
            );
            Ok(())
        }
        UpdateOutcome::InstallScheduled {
            version,
        } => {
            println!("{}", format!("Version {version} will be installed once the host exits").green());
            Ok(())
        }
        UpdateOutcome::RolledBack {
            error,
            ..
        }
        | UpdateOutcome::Failed {
            error,
        } => Err(error.into()),
    }
}
