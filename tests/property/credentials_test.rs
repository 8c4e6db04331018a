// tests/property/credentials_test.rs

//! A reload is seen completely or not at all.

use proptest::prelude::*;
use spinel_exporter::core::client::TargetAddress;
use spinel_exporter::core::credentials::{CredentialMap, CredentialStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::NamedTempFile;

fn targets(n: usize) -> Vec<TargetAddress> {
    (0..n)
        .map(|i| TargetAddress::parse(&format!("redis://10.0.0.{i}:6379")).unwrap())
        .collect()
}

fn map_json(targets: &[TargetAddress], password: &str) -> String {
    let entries: serde_json::Map<String, serde_json::Value> = targets
        .iter()
        .map(|t| (t.raw.clone(), serde_json::Value::from(password)))
        .collect();
    serde_json::Value::Object(entries).to_string()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_failed_reload_leaves_store_unchanged(
        n in 1usize..16,
        garbage in "[{}\":a-z0-9, ]{0,40}"
    ) {
        let targets = targets(n);
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), map_json(&targets, "before")).unwrap();
        let store = CredentialStore::new(Some(file.path().to_path_buf()));
        store.reload().unwrap();

        std::fs::write(file.path(), &garbage).unwrap();
        match store.reload() {
            // Some garbage is valid JSON, e.g. `{}`; then it is the new map.
            Ok(count) => prop_assert_eq!(store.snapshot().len(), count),
            Err(_) => {
                for target in &targets {
                    let password = store.lookup(target);
                    prop_assert_eq!(password.as_deref(), Some("before"));
                }
            }
        }
    }

    #[test]
    fn test_snapshots_never_mix_generations(n in 1usize..32, generations in 2usize..12) {
        let targets = Arc::new(targets(n));
        let store = Arc::new(CredentialStore::with_map(CredentialMap::from_entries(
            targets.iter().map(|t| (t.raw.clone(), "gen-0".to_string())),
        )));
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let (store, targets, done) = (store.clone(), targets.clone(), done.clone());
                std::thread::spawn(move || {
                    while !done.load(Ordering::Acquire) {
                        let snapshot = store.snapshot();
                        let first = snapshot.password_for(&targets[0]);
                        for target in targets.iter() {
                            assert_eq!(snapshot.password_for(target), first);
                        }
                    }
                })
            })
            .collect();

        for generation in 1..generations {
            let password = format!("gen-{generation}");
            store.replace(CredentialMap::from_entries(
                targets.iter().map(|t| (t.raw.clone(), password.clone())),
            ));
        }
        done.store(true, Ordering::Release);
        for reader in readers {
            prop_assert!(reader.join().is_ok());
        }

        let last = format!("gen-{}", generations - 1);
        prop_assert_eq!(store.lookup(&targets[0]), Some(last));
    }
}
