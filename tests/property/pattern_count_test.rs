// tests/property/pattern_count_test.rs

//! A pattern count equals the number of keys the pattern matches.

use crate::fake_store::{FakeStore, FakeValue};
use proptest::prelude::*;
use spinel_exporter::core::client::{ConnectOptions, Credentials, RespClient, TargetAddress};
use spinel_exporter::core::extract::KeyPattern;
use spinel_exporter::core::extract::keys::extract_count_keys;
use spinel_exporter::core::metrics::RequestRegistry;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 24,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_count_keys_matches_k(k in 0usize..40, noise in 0usize..20, db in 0u32..16) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = FakeStore::start().await;
            for i in 0..k {
                store.set(db, &format!("match:{i}"), FakeValue::String(i.to_string()));
            }
            for i in 0..noise {
                store.set(db, &format!("other:{i}"), FakeValue::String(i.to_string()));
            }

            let target = TargetAddress::parse(&store.url()).unwrap();
            let mut client =
                RespClient::connect(&target, &Credentials::default(), &ConnectOptions::default())
                    .await
                    .unwrap();
            let patterns = KeyPattern::parse_list(&format!("db{db}=match:*")).unwrap();
            let mut registry = RequestRegistry::new("test");

            extract_count_keys(&mut client, &mut registry, &patterns, 7)
                .await
                .unwrap();

            let db_label = format!("db{db}");
            assert_eq!(
                registry.get("keys_count", &[("db", db_label.as_str()), ("key", "match:*")]),
                Some(k as f64)
            );
        });
    }
}
