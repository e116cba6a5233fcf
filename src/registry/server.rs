use anyhow::{Context, Result};
use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::FileStore;
use crate::update::{ChecksumVerifier, VersionDescriptor};
use crate::version::VersionComparator;

/// Published versions of every plugin plus their artifacts.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    files: FileStore,
    versions: DashMap<String, Vec<VersionDescriptor>>,
}

impl PluginRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn files(&self) -> &FileStore {
        &self.files
    }

    /// Publish `content` as `version` of `plugin_id`.
    ///
    /// The artifact is stored as `{plugin_id}_v{version}{ext}`, where `ext` is
    /// taken from `original_file_name`. Publishing an existing version again
    /// replaces it.
    pub fn publish(
        &self,
        plugin_id: &str,
        version: &str,
        original_file_name: &str,
        release_notes: &str,
        content: impl Into<Bytes>,
    ) -> VersionDescriptor {
        let content = content.into();
        let extension = std::path::Path::new(original_file_name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let file_name = format!("{plugin_id}_v{version}{extension}");

        let descriptor = VersionDescriptor {
            version: version.to_string(),
            release_notes: release_notes.to_string(),
            file_name: file_name.clone(),
            file_size: content.len() as u64,
            file_hash: ChecksumVerifier::sha256_hex(&content),
            created_at: Utc::now(),
        };

        self.files.save(&file_name, content);

        let mut versions = self.versions.entry(plugin_id.to_string()).or_default();
        versions.retain(|existing| existing.version != version);
        versions.push(descriptor.clone());

        info!("Published {plugin_id} {version} as {file_name}");
        descriptor
    }

    /// Highest published version of `plugin_id`.
    pub fn latest(&self, plugin_id: &str) -> Option<VersionDescriptor> {
        let versions = self.versions.get(plugin_id)?;
        versions
            .iter()
            .max_by(|a, b| VersionComparator::compare(&a.version, &b.version))
            .cloned()
    }

    pub fn descriptor(&self, plugin_id: &str, version: &str) -> Option<VersionDescriptor> {
        self.versions.get(plugin_id)?.iter().find(|d| d.version == version).cloned()
    }

    /// Descriptor, bytes and MIME type of one published version.
    pub fn artifact(
        &self,
        plugin_id: &str,
        version: &str,
    ) -> Option<(VersionDescriptor, Bytes, &'static str)> {
        let descriptor = self.descriptor(plugin_id, version)?;
        let (bytes, content_type) = self.files.get(&descriptor.file_name)?;
        Some((descriptor, bytes, content_type))
    }

    /// Remove one version and its artifact.
    pub fn unpublish(&self, plugin_id: &str, version: &str) -> bool {
        let Some(descriptor) = self.descriptor(plugin_id, version) else {
            return false;
        };
        if let Some(mut versions) = self.versions.get_mut(plugin_id) {
            versions.retain(|d| d.version != version);
        }
        self.files.delete(&descriptor.file_name);
        true
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    files: usize,
    timestamp: String,
}

fn not_found(message: impl Into<String>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            message: message.into(),
        }),
    )
        .into_response()
}

async fn latest_handler(
    State(registry): State<Arc<PluginRegistry>>,
    Path(plugin_id): Path<String>,
) -> Response {
    match registry.latest(&plugin_id) {
        Some(descriptor) => {
            info!("Latest {plugin_id} is {}", descriptor.version);
            Json(descriptor).into_response()
        }
        None => not_found(format!("No versions published for {plugin_id}")),
    }
}

async fn download_handler(
    State(registry): State<Arc<PluginRegistry>>,
    Path((plugin_id, version)): Path<(String, String)>,
) -> Response {
    match registry.artifact(&plugin_id, &version) {
        Some((descriptor, bytes, content_type)) => {
            info!("Serving {} ({} bytes)", descriptor.file_name, bytes.len());
            (
                [
                    (header::CONTENT_TYPE, content_type.to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", descriptor.file_name),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        None => not_found(format!("{plugin_id} {version} not found")),
    }
}

async fn health_handler(State(registry): State<Arc<PluginRegistry>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        files: registry.files().len(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Routes consumed by the update client, plus a health probe.
pub fn router(registry: Arc<PluginRegistry>) -> Router {
    Router::new()
        .route("/api/plugins/by-unique-id/{plugin_id}/latest", get(latest_handler))
        .route("/api/download/by-unique-id/{plugin_id}/{version}", get(download_handler))
        .route("/api/health", get(health_handler))
        .with_state(registry)
}

/// Bind `addr` and serve the registry in a background task.
///
/// Returns the bound address, which differs from `addr` when port 0 was asked for.
pub async fn spawn_server(
    registry: Arc<PluginRegistry>,
    addr: SocketAddr,
) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener =
        TcpListener::bind(addr).await.with_context(|| format!("Failed to bind {addr}"))?;
    let local = listener.local_addr().context("Failed to read bound address")?;
    info!("Registry listening on http://{local}");

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(registry)).await {
            error!("Registry server stopped: {e}");
        }
    });

    Ok((local, handle))
}
