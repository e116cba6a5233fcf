//! In-memory plugin registry server.
//!
//! Serves the two endpoints the update client consumes:
//!
//! - `GET /api/plugins/by-unique-id/{id}/latest` returns the newest [`VersionDescriptor`]
//!   as JSON, or 404 when nothing is published
//! - `GET /api/download/by-unique-id/{id}/{version}` returns the artifact bytes
//!
//! plus `GET /api/health`. Artifacts live in a [`FileStore`]; nothing is
//! written to disk. Used by `plugin-updater serve` and by the integration tests.
//!
//! [`VersionDescriptor`]: crate::update::VersionDescriptor

mod server;
mod store;

pub use server::{PluginRegistry, router, spawn_server};
pub use store::{FileStore, content_type};
