//! Persistence for [`UpdateConfig`].
//!
//! The configuration is an explicit value. Whatever needs to persist it goes
//! through a [`ConfigStore`], which keeps the updater testable without touching
//! the real plugin directory.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::UpdateConfig;
use crate::constants::CONFIG_FILE_NAME;
use crate::utils::fs::atomic_write;

/// Durable storage for one [`UpdateConfig`] record.
pub trait ConfigStore: Send + Sync {
    /// Read the stored record, or `Ok(None)` if nothing has been stored yet.
    ///
    /// A record that exists but cannot be parsed is an error. It is never
    /// silently replaced with defaults.
    fn load(&self) -> Result<Option<UpdateConfig>>;

    fn save(&self, config: &UpdateConfig) -> Result<()>;

    /// Human-readable location for log messages.
    fn location(&self) -> String;

    /// Backing file, when the record lives in one another process can open.
    fn file_path(&self) -> Option<PathBuf> {
        None
    }
}

/// TOML file store, written with temp-file-and-rename.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Store at the default file name inside `plugin_dir`.
    pub fn in_plugin_dir(plugin_dir: &Path) -> Self {
        Self::new(plugin_dir.join(CONFIG_FILE_NAME))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<Option<UpdateConfig>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read update config from {}", self.path.display()))?;

        let config = toml::from_str(&content).with_context(|| {
            format!("Failed to parse update config from {}", self.path.display())
        })?;

        Ok(Some(config))
    }

    fn save(&self, config: &UpdateConfig) -> Result<()> {
        let content =
            toml::to_string_pretty(config).context("Failed to serialize update config")?;

        atomic_write(&self.path, content.as_bytes())
            .with_context(|| format!("Failed to write update config to {}", self.path.display()))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn file_path(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}

/// In-memory store for tests and embedding hosts that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    record: Mutex<Option<UpdateConfig>>,
    saves: Mutex<usize>,
}

impl MemoryConfigStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: UpdateConfig) -> Self {
        Self {
            record: Mutex::new(Some(config)),
            saves: Mutex::new(0),
        }
    }

    /// Number of times [`ConfigStore::save`] has been called.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or_default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<Option<UpdateConfig>> {
        let record = self.record.lock().map_err(|_| anyhow::anyhow!("config store lock poisoned"))?;
        Ok(record.clone())
    }

    fn save(&self, config: &UpdateConfig) -> Result<()> {
        let mut record =
            self.record.lock().map_err(|_| anyhow::anyhow!("config store lock poisoned"))?;
        *record = Some(config.clone());
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// Load the stored record, creating or repairing it as needed.
///
/// - Missing: defaults for `plugin_dir` are created and persisted.
/// - Present with empty required fields: repaired and persisted again.
pub fn load_or_create(store: &dyn ConfigStore, plugin_dir: &Path) -> Result<UpdateConfig> {
    match store.load()? {
        None => {
            let config = UpdateConfig::default_for(plugin_dir);
            store.save(&config)?;
            info!("Created default update config at {}", store.location());
            Ok(config)
        }
        Some(mut config) => {
            if config.repair(plugin_dir) {
                warn!("Update config at {} had missing fields; repaired", store.location());
                store.save(&config)?;
            } else {
                debug!("Loaded update config from {}", store.location());
            }
            Ok(config)
        }
    }
}

/// A loaded configuration bound to the store it persists to.
///
/// Every mutation goes straight to the store.
pub struct ConfigService {
    config: UpdateConfig,
    store: Box<dyn ConfigStore>,
}

impl ConfigService {
    /// Run [`load_or_create`] and keep the result.
    pub fn open(store: Box<dyn ConfigStore>, plugin_dir: &Path) -> Result<Self> {
        let config = load_or_create(store.as_ref(), plugin_dir)?;
        Ok(Self {
            config,
            store,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Record a finished check.
    pub fn mark_checked(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.config.last_check_time = Some(at);
        self.store.save(&self.config)
    }

    /// Record a successful install.
    pub fn set_current_version(&mut self, version: &str) -> Result<()> {
        self.config.current_version = version.to_string();
        self.store.save(&self.config)?;
        info!("Current version is now {version}");
        Ok(())
    }

    /// Replace the whole record and persist it.
    pub fn update(&mut self, config: UpdateConfig) -> Result<()> {
        self.config = config;
        self.store.save(&self.config)
    }

    #[must_use]
    pub fn location(&self) -> String {
        self.store.location()
    }

    #[must_use]
    pub fn file_path(&self) -> Option<PathBuf> {
        self.store.file_path()
    }
}
