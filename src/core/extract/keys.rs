// src/core/extract/keys.rs

//! Per-key extraction: `check-keys`, `check-single-keys` and `count-keys`.

use super::{KeyPattern, select_db};
use crate::core::ExporterError;
use crate::core::client::Connection;
use crate::core::metrics::RequestRegistry;
use crate::core::protocol::ReplyValue;
use indexmap::IndexSet;
use tracing::{debug, warn};

/// Size and, for numeric string values, the value of one key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyInfo {
    pub key_type: String,
    pub size: f64,
    pub value: Option<f64>,
}

/// Collects every key of the selected database matching `pattern`, scanning
/// with `SCAN cursor MATCH pattern COUNT batch_size` until the cursor wraps.
pub async fn scan_keys(
    conn: &mut dyn Connection,
    pattern: &str,
    batch_size: usize,
) -> Result<IndexSet<String>, ExporterError> {
    let batch = batch_size.max(1).to_string();
    let mut keys = IndexSet::new();
    let mut cursor = "0".to_string();

    loop {
        let reply = conn
            .query(&["SCAN", &cursor, "MATCH", pattern, "COUNT", &batch])
            .await?
            .into_sequence()?;
        let [next, page] = <[ReplyValue; 2]>::try_from(reply).map_err(|items| {
            ExporterError::Protocol(format!("SCAN reply has {} elements", items.len()))
        })?;

        for key in page.into_sequence()? {
            keys.insert(key.as_string()?);
        }

        cursor = next.as_string()?;
        if cursor == "0" {
            return Ok(keys);
        }
    }
}

/// Looks up the type, size and numeric value of one key. Returns `None` when
/// the key does not exist.
pub async fn key_info(
    conn: &mut dyn Connection,
    key: &str,
) -> Result<Option<KeyInfo>, ExporterError> {
    let key_type = conn.query(&["TYPE", key]).await?.as_string()?;
    let size_command = match key_type.as_str() {
        "none" => return Ok(None),
        "string" => "STRLEN",
        "list" => "LLEN",
        "set" => "SCARD",
        "zset" => "ZCARD",
        "hash" => "HLEN",
        "stream" => "XLEN",
        other => {
            return Err(ExporterError::Protocol(format!(
                "unsupported type '{other}' for key '{key}'"
            )));
        }
    };
    let size = conn.query(&[size_command, key]).await?.as_f64()?;

    let value = if key_type == "string" {
        conn.query(&["GET", key]).await?.as_f64().ok()
    } else {
        None
    };

    Ok(Some(KeyInfo {
        key_type,
        size,
        value,
    }))
}

/// Emits `key_size{db,key}` and, when the value parses as a number,
/// `key_value{db,key}` for the exact keys and for every key matched by the
/// patterns.
pub async fn extract_check_keys(
    conn: &mut dyn Connection,
    registry: &mut RequestRegistry,
    patterns: &[KeyPattern],
    single_keys: &[KeyPattern],
    batch_size: usize,
) -> Result<(), ExporterError> {
    let mut targets: IndexSet<(u32, String)> = single_keys
        .iter()
        .map(|k| (k.db, k.key.clone()))
        .collect();

    for pattern in patterns {
        select_db(conn, pattern.db).await?;
        for key in scan_keys(conn, &pattern.key, batch_size).await? {
            targets.insert((pattern.db, key));
        }
    }

    let mut current_db = None;
    for (db, key) in &targets {
        if current_db != Some(*db) {
            select_db(conn, *db).await?;
            current_db = Some(*db);
        }

        let info = match key_info(conn, key).await {
            Ok(Some(info)) => info,
            Ok(None) => {
                debug!("Key '{}' not found in db{}", key, db);
                continue;
            }
            Err(e) if e.is_connection_error() => return Err(e),
            Err(e) => {
                warn!("Couldn't get info for key '{}' in db{}: {}", key, db, e);
                continue;
            }
        };

        let db_label = format!("db{db}");
        let labels = [("db", db_label.as_str()), ("key", key.as_str())];
        registry.gauge(
            "key_size",
            "The length or size of \"key\"",
            &labels,
            info.size,
        );
        if let Some(value) = info.value {
            registry.gauge("key_value", "The value of \"key\"", &labels, value);
        }
    }
    Ok(())
}

/// Emits `keys_count{db,key}` with the number of keys matching each pattern.
pub async fn extract_count_keys(
    conn: &mut dyn Connection,
    registry: &mut RequestRegistry,
    patterns: &[KeyPattern],
    batch_size: usize,
) -> Result<(), ExporterError> {
    for pattern in patterns {
        select_db(conn, pattern.db).await?;
        let count = scan_keys(conn, &pattern.key, batch_size).await?.len();
        let db_label = pattern.db_label();
        registry.gauge(
            "keys_count",
            "Count of keys",
            &[("db", db_label.as_str()), ("key", pattern.key.as_str())],
            count as f64,
        );
    }
    Ok(())
}
