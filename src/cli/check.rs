use anyhow::Result;
use colored::Colorize;

use super::CliContext;

/// Manual check: unlike the startup check, failures are reported.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    let mut manager = ctx.manager(false, false)?;
    let current = manager.config().current_version.clone();

    println!("{}", "Checking for updates...".cyan());

    match manager.check_for_updates().await? {
        Some(latest) => {
            println!("{}", format!("Update available: {current} -> {}", latest.version).green());
            if !latest.release_notes.trim().is_empty() {
                println!("\n{}", latest.release_notes.trim());
            }
            println!("\nRun `plugin-updater update` to install it");
        }
        None => {
            println!("{}", format!("You are on the latest version ({current})").green());
        }
    }

    Ok(())
}
