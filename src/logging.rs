//! Tracing setup shared by both binaries.
//!
//! Output always goes to stderr. A plain-text log file can be added; when it
//! cannot be opened the process keeps running with stderr only. `RUST_LOG`
//! overrides the level chosen on the command line.

use chrono::Local;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::utils::fs::ensure_parent_dir;

/// `{dir}/{prefix}_YYYYMMDD.log` for today's local date.
#[must_use]
pub fn daily_log_path(dir: &Path, prefix: &str) -> PathBuf {
    dir.join(format!("{prefix}_{}.log", Local::now().format("%Y%m%d")))
}

/// Map `--verbose` / `--quiet` to a level.
#[must_use]
pub const fn level_for(verbose: bool, quiet: bool) -> Level {
    if verbose {
        Level::DEBUG
    } else if quiet {
        Level::ERROR
    } else {
        Level::INFO
    }
}

/// Install the global subscriber.
///
/// Returns `true` when `log_file` is being written. Calling this twice is
/// harmless; the second call leaves the first subscriber in place.
pub fn init_logging(level: Level, log_file: Option<&Path>) -> bool {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(format!("{level},hyper=warn,hyper_util=warn,reqwest=warn"))
    };

    let file = log_file.and_then(|path| match open_log_file(path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("warning: cannot write log file {}: {e}", path.display());
            None
        }
    });
    let file_enabled = file.is_some();

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
    let file_layer =
        file.map(|file| fmt::layer().with_writer(Mutex::new(file)).with_ansi(false).with_target(true));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    file_enabled
}

fn open_log_file(path: &Path) -> anyhow::Result<std::fs::File> {
    ensure_parent_dir(path)?;
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}
