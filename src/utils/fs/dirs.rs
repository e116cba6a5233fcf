//! Directory operations for creating, copying, clearing, and removing trees.
//!
//! Copies and clears accept a list of excluded paths so a backup or staging
//! directory that lives inside the plugin directory is never copied into
//! itself or wiped during a restore.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

/// Recursively copy `src` into `dst`, overwriting files that already exist.
///
/// Entries whose path equals one of `exclude` (or `dst` itself) are skipped
/// together with everything below them. Symlinks are skipped. Returns the
/// number of files copied.
pub fn copy_dir(src: &Path, dst: &Path, exclude: &[PathBuf]) -> Result<u64> {
    ensure_dir(dst)?;

    let src_root = comparable(src);
    let mut excluded: Vec<PathBuf> = exclude.iter().map(|p| comparable(p)).collect();
    excluded.push(comparable(dst));

    let mut copied = 0;
    let walker = WalkDir::new(&src_root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| !excluded.iter().any(|x| x == entry.path()));

    for entry in walker {
        let entry =
            entry.with_context(|| format!("Failed to read directory: {}", src.display()))?;
        let relative = entry
            .path()
            .strip_prefix(&src_root)
            .with_context(|| format!("Entry outside of {}", src_root.display()))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            ensure_dir(&target)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "Failed to copy file from {} to {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Remove everything inside `dir` except the paths listed in `keep`.
///
/// Directories that contain a kept path are descended into rather than removed.
/// A failure on one entry does not stop the others; all failures are reported
/// together once every entry has been tried.
pub fn clear_dir_except(dir: &Path, keep: &[PathBuf]) -> Result<()> {
    let root = comparable(dir);
    let keep: Vec<PathBuf> = keep.iter().map(|p| comparable(p)).collect();

    let mut failures = Vec::new();
    clear_inner(&root, &keep, &mut failures);
    if failures.is_empty() {
        Ok(())
    } else {
        bail!("Failed to remove {} entries: {}", failures.len(), failures.join("; "))
    }
}

fn clear_inner(dir: &Path, keep: &[PathBuf], failures: &mut Vec<String>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            failures.push(format!("{}: {e}", dir.display()));
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                failures.push(format!("{}: {e}", dir.display()));
                continue;
            }
        };
        let path = entry.path();

        if keep.iter().any(|k| k == &path) {
            continue;
        }
        if keep.iter().any(|k| k.starts_with(&path)) {
            clear_inner(&path, keep, failures);
            continue;
        }

        let removed = match entry.file_type() {
            Ok(kind) if kind.is_dir() => fs::remove_dir_all(&path),
            Ok(_) => fs::remove_file(&path),
            Err(e) => Err(e),
        };
        if let Err(e) = removed {
            failures.push(format!("{}: {e}", path.display()));
        }
    }
}

pub fn remove_dir_all(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

// Canonical form when the path exists, absolute form otherwise.
fn comparable(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
