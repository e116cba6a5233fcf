use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

use crate::utils::fs::atomic_write;

/// Suffix of the record kept next to a staged download.
pub const STAGED_RECORD_SUFFIX: &str = ".descriptor.json";

/// One published version of a plugin, as returned by the update server.
///
/// Immutable once issued; identifies exactly one artifact. On the wire the
/// keys are camelCase, and unknown keys such as a numeric `id` are ignored.
///
/// ```json
/// {
///   "version": "1.2.0",
///   "releaseNotes": "Faster wall tagging",
///   "fileName": "AcmeWalls.zip",
///   "fileSize": 48213,
///   "fileHash": "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08",
///   "createdAt": "2026-03-02T10:15:00Z"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDescriptor {
    pub version: String,
    #[serde(default)]
    pub release_notes: String,
    pub file_name: String,
    pub file_size: u64,
    /// Lowercase hex SHA-256 of the artifact.
    pub file_hash: String,
    /// RFC 3339, or a bare local timestamp which is read as UTC.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(at) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{raw}': {e}")))
}

impl VersionDescriptor {
    /// Extension of the published file name, lowercased, without the dot.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(str::to_ascii_lowercase)
    }

    /// Where the descriptor that vouched for `staged` is recorded.
    #[must_use]
    pub fn record_path(staged: &Path) -> PathBuf {
        let mut name = staged.file_name().unwrap_or_default().to_os_string();
        name.push(STAGED_RECORD_SUFFIX);
        staged.with_file_name(name)
    }

    /// Record this descriptor next to the verified download `staged`, so a
    /// later manual install can check the file again.
    pub fn write_record(&self, staged: &Path) -> Result<()> {
        let path = Self::record_path(staged);
        let json = serde_json::to_vec_pretty(self).context("Failed to serialize descriptor")?;
        atomic_write(&path, &json)
            .with_context(|| format!("Failed to write download record {}", path.display()))
    }

    pub fn read_record(staged: &Path) -> Result<Self> {
        let path = Self::record_path(staged);
        let content = std::fs::read(&path)
            .with_context(|| format!("Failed to read download record {}", path.display()))?;
        serde_json::from_slice(&content)
            .with_context(|| format!("Failed to parse download record {}", path.display()))
    }
}
