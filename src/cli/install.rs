use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::CliContext;
use super::update::report;

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Staged file produced by `plugin-updater update --no-install`.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Version the file contains.
    #[arg(value_name = "VERSION")]
    pub version: String,

    /// Install in this process instead of launching the installer executable.
    #[arg(long, conflicts_with = "detach")]
    pub in_process: bool,

    /// Start the installer and return without waiting; it finishes once the
    /// host exits and records the version itself.
    #[arg(long)]
    pub detach: bool,
}

/// Confirm a pending manual install.
pub async fn execute(ctx: &CliContext, args: InstallArgs) -> Result<()> {
    if !args.file.is_file() {
        bail!("Staged file not found: {}", args.file.display());
    }

    let mut manager = ctx.manager(args.in_process, args.detach)?;
    println!("{}", format!("Installing version {}...", args.version).cyan());

    report(manager.install_staged(&args.file, &args.version).await)
}
