//! Puts a verified artifact in place inside the plugin directory.

use anyhow::{Context, Result, bail};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::{debug, info};

use crate::utils::fs::ensure_dir;

/// Archive extensions that are recognized but cannot be extracted.
const UNSUPPORTED_ARCHIVES: &[&str] = &["rar", "7z", "tar", "gz", "tgz", "bz2", "xz"];

/// How an artifact is applied to the plugin directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Extracted over the plugin directory.
    Zip,
    /// Copied over the main artifact file.
    SingleFile,
    /// A known archive format that cannot be installed.
    UnsupportedArchive(String),
}

impl ArtifactKind {
    /// Classify by file extension, ignoring case.
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if extension == "zip" {
            Self::Zip
        } else if UNSUPPORTED_ARCHIVES.contains(&extension.as_str()) {
            Self::UnsupportedArchive(extension)
        } else {
            Self::SingleFile
        }
    }
}

/// Apply `source` to `target_dir`.
///
/// ZIP archives are extracted over the directory, overwriting existing files.
/// Anything else replaces `target_dir/main_artifact_file_name`; the stale file
/// is deleted first.
pub fn replace_artifact(source: &Path, target_dir: &Path, main_artifact_file_name: &str) -> Result<()> {
    match ArtifactKind::from_path(source) {
        ArtifactKind::Zip => extract_zip(source, target_dir),
        ArtifactKind::SingleFile => replace_file(source, &target_dir.join(main_artifact_file_name)),
        ArtifactKind::UnsupportedArchive(ext) => {
            bail!("Unsupported archive format '.{ext}' for {}", source.display())
        }
    }
}

fn replace_file(source: &Path, destination: &Path) -> Result<()> {
    if destination.exists() {
        debug!("Removing stale {}", destination.display());
        fs::remove_file(destination)
            .with_context(|| format!("Failed to remove {}", destination.display()))?;
    }

    fs::copy(source, destination).with_context(|| {
        format!("Failed to copy {} to {}", source.display(), destination.display())
    })?;

    info!("Replaced {}", destination.display());
    Ok(())
}

fn extract_zip(source: &Path, target_dir: &Path) -> Result<()> {
    let file =
        File::open(source).with_context(|| format!("Failed to open archive {}", source.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read archive {}", source.display()))?;

    info!("Extracting {} entries from {} into {}", archive.len(), source.display(), target_dir.display());

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(relative) = entry.enclosed_name() else {
            bail!("Archive entry '{}' escapes the target directory", entry.name());
        };
        let out_path = target_dir.join(relative);

        if entry.is_dir() {
            ensure_dir(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            ensure_dir(parent)?;
        }

        let mut out = File::create(&out_path)
            .with_context(|| format!("Failed to create {}", out_path.display()))?;
        io::copy(&mut entry, &mut out)
            .with_context(|| format!("Failed to extract {}", out_path.display()))?;
        debug!("Extracted {}", out_path.display());
    }

    Ok(())
}
