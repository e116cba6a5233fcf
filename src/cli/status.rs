use anyhow::Result;
use colored::Colorize;

use super::CliContext;
use crate::installer::backup::BackupManager;

pub fn execute(ctx: &CliContext) -> Result<()> {
    let service = ctx.open_config()?;
    let config = service.config();

    println!("{}", "Update configuration".bold());
    println!("  file:             {}", service.location());
    println!("  server:           {}", config.server_url);
    println!("  plugin id:        {}", config.plugin_unique_id);
    println!("  current version:  {}", config.current_version);
    println!("  target directory: {}", config.install_target_directory.display());
    println!("  main artifact:    {}", config.main_artifact_file_name);
    println!("  installer:        {}", config.installer_path.display());
    match config.last_check_time {
        Some(at) => println!("  last check:       {}", at.to_rfc3339()),
        None => println!("  last check:       never"),
    }

    let issues = config.configuration_issues();
    if issues.is_empty() {
        println!("\n{}", "Configuration is complete".green());
    } else {
        println!("\n{}", "Update checks are disabled until these are fixed:".yellow());
        for issue in &issues {
            println!("  - {issue}");
        }
    }

    let backups = BackupManager::new(config.backup_directory.clone()).list_backups()?;
    println!("\n{} ({})", "Backups".bold(), backups.len());
    for backup in backups.iter().rev() {
        println!("  {}", backup.display());
    }

    Ok(())
}

/// Apply backup retention.
pub fn prune(ctx: &CliContext) -> Result<()> {
    let service = ctx.open_config()?;
    let manager = BackupManager::new(service.config().backup_directory.clone());

    let removed = manager.prune()?;
    if removed.is_empty() {
        println!("{}", "No backups to prune".green());
    } else {
        for path in &removed {
            println!("Removed {}", path.display());
        }
        println!("{}", format!("Pruned {} backups", removed.len()).green());
    }

    Ok(())
}
