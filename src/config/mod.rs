//! Update configuration for an installed plugin
//!
//! The host application owns one [`UpdateConfig`] per plugin. It is loaded at
//! startup (created with defaults when absent, repaired when required fields
//! are empty), mutated after every successful check and every successful
//! install, and persisted on each mutation through a [`ConfigStore`].
//!
//! # Modules
//!
//! - `update_config` - the record, its defaults, repair and validity rules
//! - `store` - the [`ConfigStore`] trait, the TOML file store and [`ConfigService`]
//!
//! # Location
//!
//! By default the record lives in `update-config.toml` inside the plugin
//! directory. Placeholder values for the plugin id and main artifact are written
//! on creation and must be replaced before update checks run:
//!
//! ```toml
//! plugin_unique_id = "your-plugin-unique-id"
//! main_artifact_file_name = "YourPlugin.dll"
//! ```

mod store;
mod update_config;

pub use store::{ConfigService, ConfigStore, FileConfigStore, MemoryConfigStore, load_or_create};
pub use update_config::UpdateConfig;
