//! Error handling for the plugin updater
//!
//! The error system follows two rules:
//! 1. **Strongly-typed errors** so callers can tell a transport hiccup from a
//!    corrupted download or a failed rollback
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Error Categories
//!
//! - [`UpdateError::Transport`] - network or HTTP failure; retry on the next scheduled check
//! - [`UpdateError::Integrity`] - downloaded bytes do not match the published hash
//! - [`UpdateError::Configuration`] - required settings are missing or still placeholders
//! - [`UpdateError::Backup`] - the install target could not be snapshotted
//! - [`UpdateError::Install`] - replacement failed; carries the rollback error if any
//! - [`UpdateError::UnsupportedFormat`] - archive type the installer cannot extract
//!
//! Internal plumbing uses [`anyhow`] with context; the variants above are what
//! crosses an operation boundary. Use [`user_friendly_error`] to turn any error
//! into an [`ErrorContext`] for display.
//!
//! ```rust,no_run
//! use plugin_updater::core::{ErrorContext, UpdateError};
//!
//! let error = UpdateError::Configuration {
//!     issues: vec!["plugin unique id is not set".to_string()],
//! };
//! ErrorContext::new(error)
//!     .with_suggestion("Edit update-config.toml and set plugin_unique_id")
//!     .display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Every failure the update pipeline reports to its caller.
///
/// Fields are plain strings so the error can be cloned into outcome values and
/// logged more than once.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// Network or HTTP failure while talking to the update server.
    #[error("Transport failure during {operation}: {message}")]
    Transport {
        /// What was being attempted (e.g. "fetch latest version")
        operation: String,
        /// Underlying error text or HTTP status
        message: String,
    },

    /// The downloaded artifact's SHA-256 does not match its descriptor.
    #[error("Integrity check failed for {file}: expected {expected}, got {actual}")]
    Integrity {
        file: String,
        expected: String,
        actual: String,
    },

    /// Required settings are missing or still hold placeholder values.
    #[error("Update configuration is incomplete: {}", issues.join("; "))]
    Configuration {
        issues: Vec<String>,
    },

    /// The install target could not be copied into a backup.
    #[error("Could not back up {target}: {reason}")]
    Backup {
        target: String,
        reason: String,
    },

    /// Replacing the installed files failed.
    ///
    /// `rollback_error` is set when restoring the backup failed too.
    #[error("Failed to install version {version} into {target}: {reason}{}", rollback_suffix(rollback_error))]
    Install {
        version: String,
        target: String,
        reason: String,
        rollback_error: Option<String>,
    },

    /// The artifact is an archive type that is recognized but not extractable.
    #[error("Unsupported archive format '.{extension}' for {file}; only .zip archives can be installed")]
    UnsupportedFormat {
        file: String,
        extension: String,
    },

    /// Anything else, already formatted for display.
    #[error("{message}")]
    Other {
        message: String,
    },
}

fn rollback_suffix(rollback_error: &Option<String>) -> String {
    match rollback_error {
        Some(err) => format!(" (rollback also failed: {err})"),
        None => String::new(),
    }
}

impl UpdateError {
    /// Build a [`UpdateError::Transport`] from any displayable cause.
    pub fn transport(operation: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: cause.to_string(),
        }
    }

    /// Short machine-friendly label used in log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport {
                ..
            } => "transport",
            Self::Integrity {
                ..
            } => "integrity",
            Self::Configuration {
                ..
            } => "configuration",
            Self::Backup {
                ..
            } => "backup",
            Self::Install {
                ..
            } => "install",
            Self::UnsupportedFormat {
                ..
            } => "unsupported_format",
            Self::Other {
                ..
            } => "other",
        }
    }

    /// Whether the next scheduled check may simply try again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// An error plus the details and suggestion shown to the user.
#[derive(Debug)]
pub struct ErrorContext {
    pub error: UpdateError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: UpdateError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a suggestion where one is known.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(update_error) = error.downcast_ref::<UpdateError>() {
        return create_error_context(update_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(UpdateError::Other {
                    message: io_error.to_string(),
                })
                .with_suggestion(
                    "Check that the plugin directory is writable by the current user",
                );
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(UpdateError::Other {
                    message: io_error.to_string(),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(UpdateError::Other {
            message: format!("Invalid update configuration: {toml_error}"),
        })
        .with_suggestion("Fix the TOML syntax in update-config.toml or delete it to regenerate defaults");
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(UpdateError::Other {
        message,
    })
}

fn create_error_context(error: UpdateError) -> ErrorContext {
    match &error {
        UpdateError::Transport {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check the server URL and your network connection, then try again")
            .with_details("Nothing was installed; the next scheduled check will retry"),
        UpdateError::Integrity {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Retry the download; if it keeps failing, ask the publisher to re-upload the version")
            .with_details("The staged file was deleted and nothing was installed"),
        UpdateError::Configuration {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Run `plugin-updater status` to list the settings that still need values"),
        UpdateError::Backup {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Free disk space or fix permissions on the backup directory")
            .with_details("No files were replaced because a safety copy could not be made"),
        UpdateError::Install {
            rollback_error: None,
            ..
        } => ErrorContext::new(error)
            .with_details("The previous installation was restored from the latest backup"),
        UpdateError::Install {
            rollback_error: Some(_),
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Restore the plugin directory manually from the newest folder in the backup directory"),
        UpdateError::UnsupportedFormat {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Publish the plugin as a .zip archive or as a single file"),
        UpdateError::Other {
            ..
        } => ErrorContext::new(error),
    }
}
