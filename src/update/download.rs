//! Streams a published artifact into the staging directory and verifies it.

use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::VersionDescriptor;
use super::verification::ChecksumVerifier;
use crate::core::UpdateError;

/// Percentages 0 to 100, sent as the download progresses.
pub type ProgressSender = mpsc::Sender<u8>;

/// Downloads artifacts of one plugin from the update server.
pub struct Downloader {
    client: Client,
    base_url: String,
    plugin_id: String,
}

impl Downloader {
    pub fn new(client: Client, base_url: impl Into<String>, plugin_id: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            plugin_id: plugin_id.into(),
        }
    }

    fn download_url(&self, version: &str) -> String {
        format!("{}/api/download/by-unique-id/{}/{}", self.base_url, self.plugin_id, version)
    }

    /// Stage `descriptor`'s artifact under `destination_dir` and verify its hash.
    ///
    /// Returns the path of the verified file. On any failure no file is left
    /// behind: partial downloads and hash mismatches are deleted.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Transport`] for connection errors, timeouts and non-success statuses
    /// - [`UpdateError::Integrity`] when the SHA-256 does not match `file_hash`
    pub async fn download(
        &self,
        descriptor: &VersionDescriptor,
        destination_dir: &Path,
        progress: Option<ProgressSender>,
    ) -> Result<PathBuf, UpdateError> {
        fs::create_dir_all(destination_dir).await.map_err(|e| UpdateError::Other {
            message: format!("Failed to create staging directory {}: {e}", destination_dir.display()),
        })?;

        let staged = destination_dir.join(staged_file_name(descriptor));
        info!("Downloading {} {} to {}", self.plugin_id, descriptor.version, staged.display());

        if let Err(e) = self.stream_to(&descriptor.version, &staged, progress.as_ref()).await {
            discard(&staged).await;
            return Err(e);
        }

        if let Err(e) = ChecksumVerifier::verify_checksum(&staged, &descriptor.file_hash).await {
            discard(&staged).await;
            return Err(e);
        }

        if let Err(e) = descriptor.write_record(&staged) {
            discard(&staged).await;
            return Err(UpdateError::Other {
                message: format!("{e:#}"),
            });
        }

        info!("Downloaded and verified {}", staged.display());
        Ok(staged)
    }

    async fn stream_to(
        &self,
        version: &str,
        destination: &Path,
        progress: Option<&ProgressSender>,
    ) -> Result<(), UpdateError> {
        const OPERATION: &str = "download artifact";
        let url = self.download_url(version);
        debug!("GET {url}");

        let mut response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| UpdateError::transport(OPERATION, e))?;

        if !response.status().is_success() {
            return Err(UpdateError::transport(OPERATION, format!("HTTP {}", response.status())));
        }

        let mut file = File::create(destination).await.map_err(|e| UpdateError::Other {
            message: format!("Failed to create {}: {e}", destination.display()),
        })?;

        let total_bytes = response.content_length().filter(|len| *len > 0);
        let mut reporter = ProgressReporter::new(progress, total_bytes);
        reporter.emit(0).await;

        while let Some(chunk) =
            response.chunk().await.map_err(|e| UpdateError::transport(OPERATION, e))?
        {
            file.write_all(&chunk).await.map_err(|e| UpdateError::Other {
                message: format!("Failed to write {}: {e}", destination.display()),
            })?;
            reporter.emit(chunk.len() as u64).await;
        }

        file.flush().await.map_err(|e| UpdateError::Other {
            message: format!("Failed to flush {}: {e}", destination.display()),
        })?;

        Ok(())
    }
}

/// `update_{version}_{random}.{ext}`, keeping the published extension so the
/// installer can recognize archives.
fn staged_file_name(descriptor: &VersionDescriptor) -> String {
    let version: String = descriptor
        .version
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let extension = descriptor.extension().unwrap_or_else(|| "tmp".to_string());
    format!("update_{version}_{}.{extension}", uuid::Uuid::new_v4().simple())
}

async fn discard(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed staged file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove staged file {}: {e}", path.display()),
    }
}

/// Turns byte counts into deduplicated percentages.
///
/// Without a known length only the initial 0 is reported.
struct ProgressReporter<'a> {
    tx: Option<&'a ProgressSender>,
    total: Option<u64>,
    received: u64,
    last: Option<u8>,
}

impl<'a> ProgressReporter<'a> {
    const fn new(tx: Option<&'a ProgressSender>, total: Option<u64>) -> Self {
        Self {
            tx,
            total,
            received: 0,
            last: None,
        }
    }

    async fn emit(&mut self, new_bytes: u64) {
        self.received = self.received.saturating_add(new_bytes);
        let percent = match self.total {
            Some(total) => (self.received.saturating_mul(100) / total).min(100) as u8,
            None if self.last.is_none() => 0,
            None => return,
        };

        if self.last == Some(percent) {
            return;
        }
        self.last = Some(percent);

        if let Some(tx) = self.tx {
            let _ = tx.send(percent).await;
        }
    }
}
