//! File system helpers used by the downloader and the installer.
//!
//! - [`dirs`] - creating, copying, clearing and removing directory trees
//! - [`atomic`] - temp-file-and-rename writes for config and instruction files

pub mod atomic;
pub mod dirs;

pub use atomic::atomic_write;
pub use dirs::{clear_dir_except, copy_dir, ensure_dir, ensure_parent_dir, remove_dir_all};
