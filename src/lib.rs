//! Plugin updater - the update core of a plugin distribution system
//!
//! Keeps an installed plugin current without breaking it: checks a server for
//! newer versions, downloads and verifies them, and swaps the files in with a
//! backup and automatic rollback.
//!
//! # Architecture Overview
//!
//! A cycle is a sequential pipeline triggered once by the host:
//!
//! ```text
//! check (version compare) -> download (staging, progress) -> verify (SHA-256)
//!     -> install: wait for host exit -> backup -> replace -> prune
//!                                                   |
//!                                                   +-> rollback on failure
//! ```
//!
//! The host side ([`update::UpdateManager`]) owns the configuration and the HTTP
//! client. Installing can happen in-process or through the standalone
//! `plugin-installer` executable, which receives an [`update::InstallInstruction`]
//! file and reports through its exit code (0 installed, 1 failed, 2 rolled back).
//!
//! # Core Modules
//!
//! - [`version`] - numeric-tuple version comparison with a text fallback
//! - [`config`] - the persisted [`config::UpdateConfig`] and its store
//! - [`update`] - checker, downloader, verification and the manager
//! - [`installer`] - the backup/replace/rollback state machine
//! - [`registry`] - in-memory registry server exposing the consumed endpoints
//! - [`core`] - error taxonomy and user-facing error formatting
//! - [`logging`] - tracing setup for both binaries
//! - [`cli`] - the `plugin-updater` command line
//!
//! # Example
//!
//! ```rust,no_run
//! use plugin_updater::config::{ConfigService, FileConfigStore};
//! use plugin_updater::update::{InstallMode, UpdateManager};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let plugin_dir = Path::new("/plugins/acme");
//! let config = ConfigService::open(Box::new(FileConfigStore::in_plugin_dir(plugin_dir)), plugin_dir)?;
//! let mut manager = UpdateManager::new(config, InstallMode::External)?;
//!
//! if let Some(latest) = manager.check_for_updates().await? {
//!     let outcome = manager.download_and_install(&latest, true, None).await;
//!     println!("{outcome}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod installer;
pub mod logging;
pub mod registry;
pub mod update;
pub mod utils;
pub mod version;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
