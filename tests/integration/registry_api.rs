//! HTTP surface of the in-memory registry, exercised with a plain client.

use crate::common::spawn_registry;
use plugin_updater::update::{ChecksumVerifier, VersionDescriptor};
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn test_latest_returns_highest_version() {
    plugin_updater::test_utils::init_test_logging(None);
    let (registry, url) = spawn_registry().await;
    registry.publish("acme", "1.9.0", "Acme.zip", "", b"a".to_vec());
    registry.publish("acme", "1.10.0", "Acme.zip", "Ten", b"b".to_vec());
    registry.publish("acme", "1.2.0", "Acme.zip", "", b"c".to_vec());

    let response =
        reqwest::get(format!("{url}/api/plugins/by-unique-id/acme/latest")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let raw: Value = response.json().await.unwrap();
    assert_eq!(raw["version"], "1.10.0");
    assert_eq!(raw["releaseNotes"], "Ten");
    assert_eq!(raw["fileName"], "acme_v1.10.0.zip");
    assert_eq!(raw["fileSize"], 1);
    assert!(raw["createdAt"].is_string());

    let descriptor: VersionDescriptor = serde_json::from_value(raw).unwrap();
    assert_eq!(descriptor.file_hash, ChecksumVerifier::sha256_hex(b"b"));
}

#[tokio::test]
async fn test_latest_for_unknown_plugin_is_404() {
    plugin_updater::test_utils::init_test_logging(None);
    let (_registry, url) = spawn_registry().await;

    let response =
        reqwest::get(format!("{url}/api/plugins/by-unique-id/nobody/latest")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = response.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("nobody"));
}

#[tokio::test]
async fn test_download_serves_bytes_with_headers() {
    plugin_updater::test_utils::init_test_logging(None);
    let (registry, url) = spawn_registry().await;
    let content = b"PK\x03\x04 pretend archive".to_vec();
    registry.publish("acme", "1.2.0", "Acme.zip", "", content.clone());

    let response =
        reqwest::get(format!("{url}/api/download/by-unique-id/acme/1.2.0")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers().clone();
    assert_eq!(headers["content-type"], "application/zip");
    assert!(
        headers["content-disposition"].to_str().unwrap().contains("acme_v1.2.0.zip"),
        "{headers:?}"
    );
    assert_eq!(response.content_length(), Some(content.len() as u64));
    assert_eq!(response.bytes().await.unwrap().as_ref(), content.as_slice());
}

#[tokio::test]
async fn test_download_unknown_version_is_404() {
    plugin_updater::test_utils::init_test_logging(None);
    let (registry, url) = spawn_registry().await;
    registry.publish("acme", "1.2.0", "Acme.zip", "", b"x".to_vec());

    let response =
        reqwest::get(format!("{url}/api/download/by-unique-id/acme/9.9.9")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_reports_file_count() {
    plugin_updater::test_utils::init_test_logging(None);
    let (registry, url) = spawn_registry().await;
    registry.publish("acme", "1.0.0", "Acme.dll", "", b"x".to_vec());
    registry.publish("other", "2.0.0", "Other.zip", "", b"y".to_vec());

    let body: Value =
        reqwest::get(format!("{url}/api/health")).await.unwrap().json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["files"], 2);
    assert!(body["timestamp"].is_string());
}
