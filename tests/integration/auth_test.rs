// tests/integration/auth_test.rs

//! Tests for the Basic authentication gate on the HTTP endpoints.

use super::fake_store::FakeStore;
use super::test_helpers::{TestExporter, test_config};

async fn request(exporter: &TestExporter, credentials: Option<(&str, &str)>) -> reqwest::Response {
    let client = reqwest::Client::new();
    let mut builder = client.get(exporter.url("/metrics"));
    if let Some((user, pass)) = credentials {
        builder = builder.basic_auth(user, Some(pass));
    }
    builder.send().await.unwrap()
}

#[tokio::test]
async fn test_basic_auth_matrix() {
    let store = FakeStore::start().await;

    let cases: [(&str, &str, Option<(&str, &str)>, u16); 7] = [
        ("", "", None, 200),
        ("testuser", "testpass", Some(("testuser", "testpass")), 200),
        ("testuser", "testpass", Some(("wronguser", "testpass")), 401),
        ("testuser", "testpass", Some(("testuser", "wrongpass")), 401),
        ("testuser", "testpass", None, 401),
        // Only one field configured: auth is not active.
        ("testuser", "", None, 200),
        ("", "testpass", Some(("x", "y")), 200),
    ];

    for (config_user, config_pass, supplied, want) in cases {
        let mut config = test_config(&store.url());
        config.basic_auth_username = config_user.to_string();
        config.basic_auth_password = config_pass.to_string();
        let exporter = TestExporter::start(config).await;

        let response = request(&exporter, supplied).await;
        assert_eq!(
            response.status().as_u16(),
            want,
            "configured ({config_user:?}, {config_pass:?}), supplied {supplied:?}"
        );

        if want == 401 {
            let challenge = response.headers()["www-authenticate"].to_str().unwrap();
            assert_eq!(challenge, "Basic realm=\"redis-exporter\"");
        } else {
            let body = response.text().await.unwrap();
            assert!(body.contains("test_up"));
        }
    }
}

#[tokio::test]
async fn test_basic_auth_guards_every_endpoint() {
    let mut config = test_config("");
    config.basic_auth_username = "prom".to_string();
    config.basic_auth_password = "secret".to_string();
    config.basic_auth_realm = "custom".to_string();
    let exporter = TestExporter::start(config).await;

    for path in ["/", "/health", "/scrape?target=localhost", "/-/reload", "/discover-cluster-nodes"] {
        let response = reqwest::get(exporter.url(path)).await.unwrap();
        assert_eq!(response.status().as_u16(), 401, "path: {path}");
        assert_eq!(
            response.headers()["www-authenticate"],
            "Basic realm=\"custom\""
        );
    }
}
