use anyhow::{Context, Result, bail};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::constants::{BACKUP_PREFIX, BACKUP_RETENTION};
use crate::core::UpdateError;
use crate::utils::fs::{clear_dir_except, copy_dir, ensure_dir, remove_dir_all};

/// Manages timestamped snapshots of a plugin directory.
///
/// Every backup is a full recursive copy stored as
/// `<backup_root>/backup_YYYYMMDD_HHMMSS_mmm`, stamped in UTC. Names sort
/// chronologically, so "latest" and "oldest" are decided by name alone.
///
/// # Retention
///
/// [`prune`](Self::prune) keeps the newest [`BACKUP_RETENTION`] backups and
/// deletes the rest, oldest first. Pruning is idempotent.
///
/// # Example
///
/// ```rust,no_run
/// use plugin_updater::installer::backup::BackupManager;
/// use std::path::Path;
///
/// # fn example() -> anyhow::Result<()> {
/// let plugin_dir = Path::new("/plugins/acme");
/// let manager = BackupManager::new(plugin_dir.join("Backup"));
///
/// let backup = manager.create_backup(plugin_dir, &[])?;
/// println!("Snapshot at {}", backup.display());
///
/// // ... replace files; on failure:
/// manager.restore_from(&backup, plugin_dir, &[])?;
/// # Ok(())
/// # }
/// ```
pub struct BackupManager {
    backup_root: PathBuf,
}

impl BackupManager {
    pub fn new(backup_root: PathBuf) -> Self {
        Self {
            backup_root,
        }
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Copy `source` into a new timestamped backup.
    ///
    /// `exclude` lists paths inside `source` that are not part of the plugin
    /// (the backup root itself is always excluded). A partially written backup
    /// is removed before the error is returned.
    ///
    /// # Errors
    ///
    /// [`UpdateError::Backup`] if the source is missing or any file fails to copy.
    pub fn create_backup(&self, source: &Path, exclude: &[PathBuf]) -> Result<PathBuf, UpdateError> {
        let backup_error = |reason: String| UpdateError::Backup {
            target: source.display().to_string(),
            reason,
        };

        if !source.is_dir() {
            return Err(backup_error(format!("{} is not a directory", source.display())));
        }

        ensure_dir(&self.backup_root).map_err(|e| backup_error(format!("{e:#}")))?;

        let backup_path = self.next_backup_path();
        info!("Creating backup at {}", backup_path.display());

        let mut excluded = exclude.to_vec();
        excluded.push(self.backup_root.clone());

        match copy_dir(source, &backup_path, &excluded) {
            Ok(count) => {
                info!("Backup created successfully ({count} files)");
                Ok(backup_path)
            }
            Err(e) => {
                warn!("Backup failed, removing partial copy {}", backup_path.display());
                if let Err(cleanup) = remove_dir_all(&backup_path) {
                    warn!("Failed to remove partial backup: {cleanup:#}");
                }
                Err(backup_error(format!("{e:#}")))
            }
        }
    }

    fn next_backup_path(&self) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S_%3f");
        let base = format!("{BACKUP_PREFIX}{stamp}");
        let mut candidate = self.backup_root.join(&base);
        let mut n = 1;
        while candidate.exists() {
            candidate = self.backup_root.join(format!("{base}_{n}"));
            n += 1;
        }
        candidate
    }

    /// All backups, oldest first.
    pub fn list_backups(&self) -> Result<Vec<PathBuf>> {
        if !self.backup_root.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.backup_root).with_context(|| {
            format!("Failed to read backup directory: {}", self.backup_root.display())
        })? {
            let entry = entry?;
            let is_backup = entry.file_name().to_string_lossy().starts_with(BACKUP_PREFIX);
            if is_backup && entry.file_type()?.is_dir() {
                backups.push(entry.path());
            }
        }

        backups.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(backups)
    }

    pub fn latest_backup(&self) -> Result<Option<PathBuf>> {
        Ok(self.list_backups()?.pop())
    }

    /// Make `target` identical to the newest backup.
    pub fn restore_latest(&self, target: &Path, keep: &[PathBuf]) -> Result<PathBuf> {
        let Some(backup) = self.latest_backup()? else {
            bail!("No backup found in {}", self.backup_root.display());
        };
        self.restore_from(&backup, target, keep)?;
        Ok(backup)
    }

    /// Make `target` identical to `backup`.
    ///
    /// Everything in `target` except `keep` and the backup root is removed
    /// first, so files added by a failed install do not survive. The copy-back
    /// runs even when some of that removal failed; every failure is reported.
    pub fn restore_from(&self, backup: &Path, target: &Path, keep: &[PathBuf]) -> Result<()> {
        if !backup.is_dir() {
            bail!("Backup {} does not exist", backup.display());
        }

        warn!("Restoring {} from backup {}", target.display(), backup.display());

        let mut kept = keep.to_vec();
        kept.push(self.backup_root.clone());

        let cleared = clear_dir_except(target, &kept);
        if let Err(e) = &cleared {
            warn!("Restore could not clear {}: {e:#}", target.display());
        }
        let copied = copy_dir(backup, target, &[]);

        match (cleared, copied) {
            (Ok(()), Ok(count)) => {
                info!("Restored {count} files from backup");
                Ok(())
            }
            (Err(clear), Ok(_)) => Err(clear)
                .with_context(|| format!("Restored {} but leftovers remain", target.display())),
            (Ok(()), Err(copy)) => Err(copy)
                .with_context(|| format!("Failed to copy backup {} back", backup.display())),
            (Err(clear), Err(copy)) => bail!(
                "Failed to copy backup {} back: {copy:#}; clearing also failed: {clear:#}",
                backup.display()
            ),
        }
    }

    /// Delete all but the newest `retention` backups. Returns what was removed.
    pub fn prune(&self) -> Result<Vec<PathBuf>> {
        let backups = self.list_backups()?;
        if backups.len() <= BACKUP_RETENTION {
            debug!("{} backups present, nothing to prune", backups.len());
            return Ok(Vec::new());
        }

        let excess = backups.len() - BACKUP_RETENTION;
        let mut removed = Vec::with_capacity(excess);
        for old in backups.into_iter().take(excess) {
            debug!("Removing old backup {}", old.display());
            remove_dir_all(&old)?;
            removed.push(old);
        }

        info!("Pruned {} old backups", removed.len());
        Ok(removed)
    }
}
