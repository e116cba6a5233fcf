//! Test utilities for the plugin updater
//!
//! Helpers shared by unit tests and the integration suite:
//! - one-time tracing setup that writes through the test harness
//! - building ZIP artifacts in memory
//! - snapshotting a directory tree for byte-for-byte comparisons
//!
//! # Example
//!
//! ```rust,no_run
//! use plugin_updater::test_utils::{init_test_logging, snapshot_tree};
//! use std::path::Path;
//!
//! init_test_logging(None);
//! let before = snapshot_tree(Path::new("/plugins/acme"), &["Backup", "Temp", "Logs"]);
//! ```

use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging stays
/// off. Safe to call from every test.
///
/// ```bash
/// RUST_LOG=plugin_updater=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

/// Build a ZIP archive in memory from `(name, contents)` pairs, in order.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap_or_else(|e| panic!("Failed to start zip entry {name}: {e}"));
        writer.write_all(data).unwrap_or_else(|e| panic!("Failed to write zip entry {name}: {e}"));
    }
    writer.finish().unwrap_or_else(|e| panic!("Failed to finish zip: {e}")).into_inner()
}

/// Every file under `dir` keyed by its `/`-separated relative path.
///
/// Top-level entries whose relative path starts with one of `exclude` are skipped.
pub fn snapshot_tree(dir: &Path, exclude: &[&str]) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| {
            let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
            !exclude.iter().any(|x| relative.starts_with(x))
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry
                .path()
                .strip_prefix(dir)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            let data = std::fs::read(entry.path())
                .unwrap_or_else(|e| panic!("Failed to read {}: {e}", entry.path().display()));
            (relative, data)
        })
        .collect()
}
