use axum::body::Bytes;
use dashmap::DashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Artifact bytes kept in memory, keyed by file name.
///
/// Insert, lookup and removal are atomic per key; concurrent requests for
/// different files never block each other.
#[derive(Debug, Default)]
pub struct FileStore {
    files: DashMap<String, Bytes>,
}

impl FileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `content` under `file_name`, replacing any previous content.
    pub fn save(&self, file_name: &str, content: Bytes) {
        info!("Stored {file_name} ({} bytes)", content.len());
        self.files.insert(file_name.to_string(), content);
    }

    /// Content and MIME type of `file_name`.
    pub fn get(&self, file_name: &str) -> Option<(Bytes, &'static str)> {
        match self.files.get(file_name) {
            Some(entry) => {
                debug!("Serving {file_name} ({} bytes)", entry.len());
                Some((entry.value().clone(), content_type(file_name)))
            }
            None => {
                warn!("File not found in store: {file_name}");
                None
            }
        }
    }

    pub fn delete(&self, file_name: &str) -> bool {
        let removed = self.files.remove(file_name).is_some();
        if removed {
            info!("Removed {file_name} from store");
        }
        removed
    }

    /// Stored names, sorted.
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// MIME type by extension.
#[must_use]
pub fn content_type(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("zip") => "application/zip",
        Some("rar") => "application/x-rar-compressed",
        _ => "application/octet-stream",
    }
}
