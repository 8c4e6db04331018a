// tests/integration/http_test.rs

//! End-to-end tests of `/metrics`, `/scrape`, `/health` and the landing page.

use super::fake_store::{FakeStore, FakeValue};
use super::test_helpers::{TestExporter, closed_port, sample_value, test_config};

#[tokio::test]
async fn test_metrics_scrapes_static_target() {
    let store = FakeStore::start().await;
    store.set_connected_clients(7);
    let exporter = TestExporter::start(test_config(&store.url())).await;

    let (status, body) = exporter.get("/metrics").await;
    assert_eq!(status, 200);
    assert_eq!(sample_value(&body, "test_up"), Some(1.0));
    assert_eq!(sample_value(&body, "test_connected_clients"), Some(7.0));
    assert_eq!(sample_value(&body, "test_config_maxclients"), Some(10000.0));
    assert!(body.contains("test_exporter_scrapes_total"));
    assert!(body.contains("test_instance_info{"));
}

#[tokio::test]
async fn test_metrics_reports_down_target_with_200() {
    let exporter = TestExporter::start(test_config(&closed_port().await)).await;

    let (status, body) = exporter.get("/metrics").await;
    assert_eq!(status, 200);
    assert_eq!(sample_value(&body, "test_up"), Some(0.0));
    assert_eq!(
        sample_value(
            &body,
            "test_exporter_last_scrape_error{err=\"connection failed\"}"
        ),
        Some(1.0)
    );
}

#[tokio::test]
async fn test_scrape_of_non_redis_peer_reports_down() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // A web server on the target port answers every command with an HTTP error.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = [0u8; 1024];
                let _ = socket.read(&mut request).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n")
                    .await;
            });
        }
    });
    let exporter = TestExporter::start(test_config("")).await;

    let (status, body) = exporter
        .get(&format!("/scrape?target=redis://{addr}"))
        .await;
    assert_eq!(status, 200);
    assert_eq!(sample_value(&body, "test_up"), Some(0.0));
    assert_eq!(
        sample_value(&body, "test_exporter_last_scrape_error{err=\"protocol error\"}"),
        Some(1.0)
    );
    assert_eq!(sample_value(&body, "test_connected_clients"), None);
}

#[tokio::test]
async fn test_scrape_single_key_size_and_value() {
    let store = FakeStore::start().await;
    store.set(11, "key_1", FakeValue::String("12345".into()));
    store.set(11, "list_1", FakeValue::List(vec!["a".into(), "b".into(), "c".into()]));
    let exporter = TestExporter::start(test_config("")).await;

    let (status, body) = exporter
        .get(&format!(
            "/scrape?target={}&check-single-keys=db11=key_1,db11=list_1",
            store.url()
        ))
        .await;
    assert_eq!(status, 200);
    assert_eq!(
        sample_value(&body, "test_key_size{db=\"db11\",key=\"key_1\"}"),
        Some(5.0)
    );
    assert_eq!(
        sample_value(&body, "test_key_value{db=\"db11\",key=\"key_1\"}"),
        Some(12345.0)
    );
    assert_eq!(
        sample_value(&body, "test_key_size{db=\"db11\",key=\"list_1\"}"),
        Some(3.0)
    );
    // Only the configured target's endpoint exposes process metrics.
    assert!(!body.contains("process_start_time_seconds"));
}

#[tokio::test]
async fn test_scrape_count_keys() {
    let store = FakeStore::start().await;
    for i in 0..5 {
        store.set(0, &format!("session:{i}"), FakeValue::String("x".into()));
    }
    store.set(0, "other", FakeValue::String("y".into()));
    let exporter = TestExporter::start(test_config("")).await;

    let (_, body) = exporter
        .get(&format!("/scrape?target={}&count-keys=session:*", store.url()))
        .await;
    assert_eq!(
        sample_value(&body, "test_keys_count{db=\"db0\",key=\"session:*\"}"),
        Some(5.0)
    );
}

#[tokio::test]
async fn test_scrape_missing_target_is_bad_request() {
    let exporter = TestExporter::start(test_config("")).await;

    for path in ["/scrape", "/scrape?target=", "/scrape?check-single-keys=db0=a"] {
        let (status, body) = exporter.get(path).await;
        assert_eq!(status, 400, "path: {path}");
        assert!(!body.is_empty());
    }
}

#[tokio::test]
async fn test_scrape_malformed_input_is_bad_request() {
    let store = FakeStore::start().await;
    let exporter = TestExporter::start(test_config("")).await;

    let bad_target = exporter.get("/scrape?target=://nope").await;
    assert_eq!(bad_target.0, 400);

    let trailing = exporter
        .get(&format!("/scrape?target={}-", store.url()))
        .await;
    assert_eq!(trailing.0, 400);

    let bad_checks = exporter
        .get(&format!("/scrape?target={}&check-streams=1=2=3=4", store.url()))
        .await;
    assert_eq!(bad_checks.0, 400);
}

#[tokio::test]
async fn test_scrape_uses_password_from_target_url() {
    let store = FakeStore::start().await;
    store.require_password("s3cret");
    let exporter = TestExporter::start(test_config("")).await;

    let (_, body) = exporter
        .get(&format!("/scrape?target=redis://:s3cret@{}", store.addr))
        .await;
    assert_eq!(sample_value(&body, "test_up"), Some(1.0));

    let (_, body) = exporter
        .get(&format!("/scrape?target=redis://:wrong@{}", store.addr))
        .await;
    assert_eq!(sample_value(&body, "test_up"), Some(0.0));
    assert_eq!(
        sample_value(
            &body,
            "test_exporter_last_scrape_error{err=\"authentication failed\"}"
        ),
        Some(1.0)
    );
}

#[tokio::test]
async fn test_health_and_landing_page() {
    let exporter = TestExporter::start(test_config("")).await;

    assert_eq!(exporter.get("/health").await, (200, "ok".to_string()));

    let (status, body) = exporter.get("/").await;
    assert_eq!(status, 200);
    assert!(body.contains("href='/metrics'"));
}
