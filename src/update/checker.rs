//! Asks the update server for the latest published version.

use reqwest::{Client, StatusCode};
use tracing::{debug, info};

use super::VersionDescriptor;
use crate::core::UpdateError;
use crate::version::VersionComparator;

/// Client for the "latest version" endpoint of one plugin.
pub struct UpdateChecker {
    client: Client,
    base_url: String,
    plugin_id: String,
}

impl UpdateChecker {
    pub fn new(client: Client, base_url: impl Into<String>, plugin_id: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            plugin_id: plugin_id.into(),
        }
    }

    fn latest_url(&self) -> String {
        format!("{}/api/plugins/by-unique-id/{}/latest", self.base_url, self.plugin_id)
    }

    /// Fetch the latest descriptor the server has for this plugin.
    ///
    /// A 404 means nothing is published and yields `Ok(None)`. Any other
    /// non-success status, connection error or undecodable body is a
    /// [`UpdateError::Transport`].
    pub async fn fetch_latest(&self) -> Result<Option<VersionDescriptor>, UpdateError> {
        const OPERATION: &str = "fetch latest version";
        let url = self.latest_url();
        debug!("Fetching latest version from {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| UpdateError::transport(OPERATION, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            info!("No version of {} is published", self.plugin_id);
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(UpdateError::transport(OPERATION, format!("HTTP {}", response.status())));
        }

        let descriptor = response
            .json::<VersionDescriptor>()
            .await
            .map_err(|e| UpdateError::transport(OPERATION, e))?;

        debug!("Server reports {} {}", self.plugin_id, descriptor.version);
        Ok(Some(descriptor))
    }

    /// The latest descriptor if it is strictly newer than `current_version`.
    pub async fn check(&self, current_version: &str) -> Result<Option<VersionDescriptor>, UpdateError> {
        let Some(latest) = self.fetch_latest().await? else {
            return Ok(None);
        };

        if VersionComparator::is_newer(&latest.version, current_version) {
            info!("Update available: {current_version} -> {}", latest.version);
            Ok(Some(latest))
        } else {
            info!("Already up to date ({current_version}, latest {})", latest.version);
            Ok(None)
        }
    }
}
