use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::registry::{PluginRegistry, spawn_server};

/// One artifact to publish at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub plugin_id: String,
    pub version: String,
    pub path: PathBuf,
}

fn parse_publication(value: &str) -> Result<Publication, String> {
    let mut parts = value.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(id), Some(version), Some(path))
            if !id.is_empty() && !version.is_empty() && !path.is_empty() =>
        {
            Ok(Publication {
                plugin_id: id.to_string(),
                version: version.to_string(),
                path: PathBuf::from(path),
            })
        }
        _ => Err(format!("expected PLUGIN_ID:VERSION:PATH, got '{value}'")),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub addr: SocketAddr,

    /// Publish a file at startup, as PLUGIN_ID:VERSION:PATH. Repeatable.
    #[arg(long, value_name = "PLUGIN_ID:VERSION:PATH", value_parser = parse_publication)]
    pub publish: Vec<Publication>,
}

pub async fn execute(args: ServeArgs) -> Result<()> {
    let registry = Arc::new(PluginRegistry::new());

    for publication in &args.publish {
        let content = tokio::fs::read(&publication.path)
            .await
            .with_context(|| format!("Failed to read {}", publication.path.display()))?;
        let file_name = publication
            .path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let descriptor = registry.publish(
            &publication.plugin_id,
            &publication.version,
            &file_name,
            "",
            content,
        );
        println!(
            "Published {} {} ({} bytes, sha256 {})",
            publication.plugin_id, descriptor.version, descriptor.file_size, descriptor.file_hash
        );
    }

    let (addr, server) = spawn_server(Arc::clone(&registry), args.addr).await?;
    println!("{}", format!("Registry listening on http://{addr} (Ctrl+C to stop)").green());

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
    info!("Shutting down registry");
    server.abort();
    Ok(())
}
