//! Version handling for plugin releases.
//!
//! - [`comparison`] - numeric-tuple comparison with a textual fallback

pub mod comparison;

pub use comparison::{VersionComparator, compare_versions, is_newer};
