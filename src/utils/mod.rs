//! Utilities shared by the host client and the installer
//!
//! - [`fs`] - directory copies with exclusions, clearing, atomic writes
//! - [`progress`] - terminal progress bar for downloads

pub mod fs;
pub mod progress;

pub use fs::{atomic_write, copy_dir, ensure_dir};
pub use progress::DownloadProgressBar;
