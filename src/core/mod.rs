//! Core types shared by every part of the updater
//!
//! ## `error` - Error Handling
//!
//! - [`UpdateError`] - the failure taxonomy of the update pipeline
//! - [`ErrorContext`] - user-facing wrapper with details and a suggestion
//! - [`user_friendly_error`] - convert any [`anyhow::Error`] for display
//!
//! Every operation that can fail returns a [`Result`]. Low-level helpers return
//! `anyhow::Result` with context; pipeline stages convert to [`UpdateError`]
//! before handing the failure to their caller.

pub mod error;

pub use error::{ErrorContext, UpdateError, user_friendly_error};
