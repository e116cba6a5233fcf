use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::core::UpdateError;

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Verifies downloaded artifacts against the SHA-256 published by the server.
///
/// Hashes are plain lowercase hex without an algorithm prefix, matching the
/// `fileHash` field of a version descriptor. Comparison ignores case.
pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// Compute the SHA-256 of a file as lowercase hex.
    ///
    /// The file is streamed in fixed-size blocks, so large artifacts are never
    /// held in memory.
    ///
    /// ```rust,no_run
    /// use plugin_updater::update::verification::ChecksumVerifier;
    /// use std::path::Path;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let checksum = ChecksumVerifier::compute_sha256(Path::new("Temp/update_1.2.0.zip")).await?;
    /// println!("SHA256: {checksum}");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn compute_sha256(file_path: &Path) -> Result<String> {
        debug!("Computing SHA256 checksum for: {}", file_path.display());

        let mut file = fs::File::open(file_path)
            .await
            .with_context(|| format!("Failed to open file: {}", file_path.display()))?;

        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
        loop {
            let read = file
                .read(&mut buffer)
                .await
                .with_context(|| format!("Failed to read file: {}", file_path.display()))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// SHA-256 of an in-memory buffer as lowercase hex.
    #[must_use]
    pub fn sha256_hex(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    /// Verify a file against an expected checksum.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Integrity`] if the hashes differ
    /// - [`UpdateError::Other`] if the file cannot be read
    pub async fn verify_checksum(file_path: &Path, expected_checksum: &str) -> Result<(), UpdateError> {
        info!("Verifying checksum for: {}", file_path.display());

        let actual_checksum = Self::compute_sha256(file_path).await.map_err(|e| UpdateError::Other {
            message: format!("{e:#}"),
        })?;

        if !actual_checksum.eq_ignore_ascii_case(expected_checksum.trim()) {
            warn!(
                "Checksum mismatch for {}: expected {expected_checksum}, got {actual_checksum}",
                file_path.display()
            );
            return Err(UpdateError::Integrity {
                file: file_path.display().to_string(),
                expected: expected_checksum.to_string(),
                actual: actual_checksum,
            });
        }

        info!("Checksum verification successful");
        Ok(())
    }
}
