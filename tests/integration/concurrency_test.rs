// tests/integration/concurrency_test.rs

//! Many concurrent scrapes of different targets must not share samples.

use super::fake_store::{FakeStore, FakeValue};
use super::test_helpers::{TestExporter, sample_value, test_config};
use futures::future::join_all;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const STORES: usize = 4;
const SCRAPES: usize = 32;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_scrapes_are_isolated() {
    let mut stores = Vec::new();
    for i in 0..STORES {
        let store = FakeStore::start().await;
        store.set_connected_clients(100 + i as i64);
        store.set(0, "marker", FakeValue::String(i.to_string()));
        store.set(0, &format!("only_on_{i}"), FakeValue::String("1".into()));
        stores.push(store);
    }
    let exporter = TestExporter::start(test_config("")).await;

    let mut rng = SmallRng::seed_from_u64(7);
    let picks: Vec<usize> = (0..SCRAPES).map(|_| rng.gen_range(0..STORES)).collect();

    let client = reqwest::Client::new();
    let requests = picks.iter().map(|&i| {
        let url = exporter.url(&format!(
            "/scrape?target={}&check-single-keys=marker&count-keys=only_on_*",
            stores[i].url()
        ));
        let client = client.clone();
        async move {
            let body = client.get(url).send().await.unwrap().text().await.unwrap();
            (i, body)
        }
    });

    for (i, body) in join_all(requests).await {
        assert_eq!(sample_value(&body, "test_up"), Some(1.0));
        assert_eq!(
            sample_value(&body, "test_connected_clients"),
            Some(100.0 + i as f64)
        );
        assert_eq!(
            sample_value(&body, "test_key_value{db=\"db0\",key=\"marker\"}"),
            Some(i as f64)
        );
        assert_eq!(
            sample_value(&body, "test_keys_count{db=\"db0\",key=\"only_on_*\"}"),
            Some(1.0)
        );
        // Exactly one up sample per response.
        assert_eq!(body.lines().filter(|l| l.starts_with("test_up ")).count(), 1);
    }
}
