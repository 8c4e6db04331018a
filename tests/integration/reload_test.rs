// tests/integration/reload_test.rs

//! Tests for `/-/reload` and the credentials file.

use super::fake_store::FakeStore;
use super::test_helpers::{TestExporter, sample_value, test_config};
use tempfile::NamedTempFile;

fn write_file(file: &NamedTempFile, content: &str) {
    std::fs::write(file.path(), content).unwrap();
}

#[tokio::test]
async fn test_reload_without_file() {
    let exporter = TestExporter::start(test_config("")).await;

    let (status, body) = exporter.get("/-/reload").await;
    assert_eq!(status, 500);
    assert!(body.contains("There is no pwd file specified"));
}

#[tokio::test]
async fn test_reload_picks_up_new_password() {
    let store = FakeStore::start().await;
    store.require_password("first");

    let file = NamedTempFile::new().unwrap();
    write_file(&file, &format!(r#"{{"{}": "first"}}"#, store.url()));

    let mut config = test_config("");
    config.password_file = Some(file.path().to_string_lossy().into_owned());
    let exporter = TestExporter::start(config).await;

    let scrape = format!("/scrape?target={}", store.url());
    let (_, body) = exporter.get(&scrape).await;
    assert_eq!(sample_value(&body, "test_up"), Some(1.0));

    store.require_password("second");
    let (_, body) = exporter.get(&scrape).await;
    assert_eq!(sample_value(&body, "test_up"), Some(0.0));

    write_file(&file, &format!(r#"{{"{}": "second"}}"#, store.url()));
    assert_eq!(exporter.get("/-/reload").await, (200, "ok".to_string()));

    let (_, body) = exporter.get(&scrape).await;
    assert_eq!(sample_value(&body, "test_up"), Some(1.0));
}

#[tokio::test]
async fn test_malformed_reload_keeps_previous_map() {
    let store = FakeStore::start().await;
    store.require_password("kept");

    let file = NamedTempFile::new().unwrap();
    write_file(&file, &format!(r#"{{"{}": "kept"}}"#, store.url()));

    let mut config = test_config("");
    config.password_file = Some(file.path().to_string_lossy().into_owned());
    let exporter = TestExporter::start(config).await;

    // Truncated JSON.
    write_file(&file, r#"{"redis://localhost:6379": "#);
    let (status, body) = exporter.get("/-/reload").await;
    assert_eq!(status, 500);
    assert!(body.starts_with("failed to reload passwords file: "));

    let (_, body) = exporter
        .get(&format!("/scrape?target={}", store.url()))
        .await;
    assert_eq!(sample_value(&body, "test_up"), Some(1.0));
}
