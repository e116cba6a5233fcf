//! Host-side update pipeline.
//!
//! A cycle runs check, download, verify and then install or stage. Each stage
//! lives in its own module and the [`UpdateManager`] drives them in order:
//!
//! 1. [`checker`] asks the server for the latest descriptor and compares versions
//! 2. [`download`] streams the artifact into the staging directory with progress
//! 3. [`verification`] checks the SHA-256 of the staged file
//! 4. the [`crate::installer`] applies the file, either in-process or through the
//!    standalone installer executable fed an [`InstallInstruction`]
//!
//! Outcomes are returned as values ([`UpdateOutcome`], [`StartupCheck`]);
//! progress travels over an explicit channel passed to the download call.

/// Latest-version lookup against the update server.
pub mod checker;
/// Wire type for one published version.
pub mod descriptor;
/// Streaming download into the staging directory.
pub mod download;
/// Handoff record for the standalone installer.
pub mod instruction;
/// Orchestration of a full check/download/install cycle.
pub mod manager;
/// SHA-256 verification of staged artifacts.
pub mod verification;

use anyhow::{Context, Result};
use reqwest::Client;

use crate::constants::HTTP_TIMEOUT;

pub use checker::UpdateChecker;
pub use descriptor::VersionDescriptor;
pub use download::{Downloader, ProgressSender};
pub use instruction::InstallInstruction;
pub use manager::{InstallMode, StartupCheck, UpdateManager, UpdateOutcome};
pub use verification::ChecksumVerifier;

/// HTTP client with the overall request timeout applied.
pub fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}
