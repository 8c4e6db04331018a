// tests/integration/discovery_test.rs

//! Tests for `/discover-cluster-nodes`.

use super::fake_store::FakeStore;
use super::test_helpers::{TestExporter, closed_port, test_config};

const NOT_A_CLUSTER: &str = "The discovery endpoint is only available on a redis cluster";

fn nodes_text(ports: &[u16]) -> String {
    ports
        .iter()
        .enumerate()
        .map(|(i, port)| {
            format!("{i:040x} 127.0.0.1:{port}@1{port} master - 0 0 {i} connected\n")
        })
        .collect()
}

#[tokio::test]
async fn test_discovery_lists_cluster_nodes() {
    let store = FakeStore::start().await;
    // The seed reports one node twice, as a primary and again after a failover.
    let mut nodes = nodes_text(&[7000, 7001, 7002]);
    nodes.push_str(&nodes_text(&[7001]));
    store.enable_cluster(&nodes);

    let mut config = test_config(&store.url());
    config.is_cluster = true;
    let exporter = TestExporter::start(config).await;

    let (status, body) = exporter.get("/discover-cluster-nodes").await;
    assert_eq!(status, 200);
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(
        lines,
        [
            "redis://127.0.0.1:7000",
            "redis://127.0.0.1:7001",
            "redis://127.0.0.1:7002"
        ]
    );
}

#[tokio::test]
async fn test_discovery_on_standalone_node() {
    let store = FakeStore::start().await;

    // Cluster mode not configured: the exporter does not even ask.
    let exporter = TestExporter::start(test_config(&store.url())).await;
    let (status, body) = exporter.get("/discover-cluster-nodes").await;
    assert_eq!(status, 200);
    assert_eq!(body, NOT_A_CLUSTER);

    // Configured as a cluster, but the node has cluster support disabled.
    let mut config = test_config(&store.url());
    config.is_cluster = true;
    let exporter = TestExporter::start(config).await;
    let (status, body) = exporter.get("/discover-cluster-nodes").await;
    assert_eq!(status, 200);
    assert_eq!(body, NOT_A_CLUSTER);
}

#[tokio::test]
async fn test_discovery_unreachable_seed_is_distinct() {
    let mut config = test_config(&closed_port().await);
    config.is_cluster = true;
    let exporter = TestExporter::start(config).await;

    let (status, body) = exporter.get("/discover-cluster-nodes").await;
    assert_eq!(status, 200);
    assert!(body.starts_with("Couldn't connect to redis cluster"));
    assert_ne!(body, NOT_A_CLUSTER);
}

#[tokio::test]
async fn test_discovery_falls_back_to_next_seed() {
    let store = FakeStore::start().await;
    store.enable_cluster(&nodes_text(&[7000]));

    let mut config = test_config(&closed_port().await);
    config.is_cluster = true;
    config.cluster_seed_nodes = vec![store.url()];
    let exporter = TestExporter::start(config).await;

    let (_, body) = exporter.get("/discover-cluster-nodes").await;
    assert_eq!(body.trim(), "redis://127.0.0.1:7000");
}
