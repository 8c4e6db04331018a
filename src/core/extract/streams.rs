// src/core/extract/streams.rs

//! Stream extraction via `XINFO STREAM`, `XINFO GROUPS` and `XINFO CONSUMERS`.

use super::keys::scan_keys;
use super::{KeyPattern, select_db};
use crate::core::ExporterError;
use crate::core::client::Connection;
use crate::core::metrics::RequestRegistry;
use crate::core::protocol::ReplyValue;
use crate::core::protocol::coerce::{field_f64, field_string};
use indexmap::IndexSet;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct StreamConsumer {
    pub name: String,
    pub pending: f64,
    pub idle_seconds: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamGroup {
    pub name: String,
    pub pending: f64,
    pub consumers: Vec<StreamConsumer>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub key: String,
    pub length: f64,
    pub radix_tree_keys: f64,
    pub radix_tree_nodes: f64,
    /// Milliseconds part of `last-generated-id`.
    pub last_generated_id_ms: Option<f64>,
    pub groups: Vec<StreamGroup>,
}

/// Fetches the stream, its groups and their consumers. Returns `None` when
/// the key does not exist or is not a stream.
pub async fn stream_info(
    conn: &mut dyn Connection,
    key: &str,
) -> Result<Option<StreamInfo>, ExporterError> {
    let reply = conn.execute(&["XINFO", "STREAM", key]).await?;
    if let ReplyValue::ProtocolError(msg) = &reply {
        debug!("XINFO STREAM {} failed: {}", key, msg);
        return Ok(None);
    }
    let fields = reply.into_field_map()?;

    let last_generated_id_ms = field_string(&fields, "last-generated-id")
        .ok()
        .and_then(|id| id.split('-').next().and_then(|ms| ms.parse::<f64>().ok()));

    let mut info = StreamInfo {
        key: key.to_string(),
        length: field_f64(&fields, "length")?,
        radix_tree_keys: field_f64(&fields, "radix-tree-keys")?,
        radix_tree_nodes: field_f64(&fields, "radix-tree-nodes")?,
        last_generated_id_ms,
        groups: Vec::new(),
    };

    let groups = conn.query(&["XINFO", "GROUPS", key]).await?.into_sequence()?;
    for group in groups {
        let group = group.into_field_map()?;
        let name = field_string(&group, "name")?;

        let consumers = conn
            .query(&["XINFO", "CONSUMERS", key, &name])
            .await?
            .into_sequence()?
            .into_iter()
            .map(|consumer| {
                let consumer = consumer.into_field_map()?;
                Ok(StreamConsumer {
                    name: field_string(&consumer, "name")?,
                    pending: field_f64(&consumer, "pending")?,
                    idle_seconds: field_f64(&consumer, "idle")? / 1e3,
                })
            })
            .collect::<Result<Vec<_>, ExporterError>>()?;

        info.groups.push(StreamGroup {
            name,
            pending: field_f64(&group, "pending")?,
            consumers,
        });
    }

    Ok(Some(info))
}

fn record_stream(registry: &mut RequestRegistry, db: &str, info: &StreamInfo) {
    let stream_labels = [("db", db), ("stream", info.key.as_str())];
    registry.gauge(
        "stream_length",
        "The number of elements of the stream",
        &stream_labels,
        info.length,
    );
    registry.gauge(
        "stream_radix_tree_keys",
        "Radix tree keys count",
        &stream_labels,
        info.radix_tree_keys,
    );
    registry.gauge(
        "stream_radix_tree_nodes",
        "Radix tree nodes count",
        &stream_labels,
        info.radix_tree_nodes,
    );
    registry.gauge(
        "stream_groups",
        "Groups count of stream",
        &stream_labels,
        info.groups.len() as f64,
    );
    if let Some(ms) = info.last_generated_id_ms {
        registry.gauge(
            "stream_last_generated_id",
            "The epoch milliseconds part of the last generated id",
            &stream_labels,
            ms,
        );
    }

    for group in &info.groups {
        let group_labels = [
            ("db", db),
            ("stream", info.key.as_str()),
            ("group", group.name.as_str()),
        ];
        registry.gauge(
            "stream_group_consumers",
            "Consumers count of group",
            &group_labels,
            group.consumers.len() as f64,
        );
        registry.gauge(
            "stream_group_messages_pending",
            "Pending number of messages in that stream group",
            &group_labels,
            group.pending,
        );

        for consumer in &group.consumers {
            let consumer_labels = [
                ("db", db),
                ("stream", info.key.as_str()),
                ("group", group.name.as_str()),
                ("consumer", consumer.name.as_str()),
            ];
            registry.gauge(
                "stream_group_consumer_messages_pending",
                "Pending number of messages for this specific consumer",
                &consumer_labels,
                consumer.pending,
            );
            registry.gauge(
                "stream_group_consumer_idle_seconds",
                "Consumer idle time in seconds",
                &consumer_labels,
                consumer.idle_seconds,
            );
        }
    }
}

/// Emits the `stream_*` families for the exact streams and for every stream
/// matched by the patterns.
pub async fn extract_streams(
    conn: &mut dyn Connection,
    registry: &mut RequestRegistry,
    patterns: &[KeyPattern],
    single_streams: &[KeyPattern],
    batch_size: usize,
) -> Result<(), ExporterError> {
    let mut targets: IndexSet<(u32, String)> = IndexSet::new();

    for pattern in patterns {
        select_db(conn, pattern.db).await?;
        for key in scan_keys(conn, &pattern.key, batch_size).await? {
            let key_type = conn.query(&["TYPE", &key]).await?.as_string()?;
            if key_type == "stream" {
                targets.insert((pattern.db, key));
            }
        }
    }
    targets.extend(single_streams.iter().map(|s| (s.db, s.key.clone())));

    let mut current_db = None;
    for (db, key) in &targets {
        if current_db != Some(*db) {
            select_db(conn, *db).await?;
            current_db = Some(*db);
        }

        match stream_info(conn, key).await {
            Ok(Some(info)) => record_stream(registry, &format!("db{db}"), &info),
            Ok(None) => {}
            Err(e) if e.is_connection_error() => return Err(e),
            Err(e) => warn!("Couldn't read stream '{}' in db{}: {}", key, db, e),
        }
    }
    Ok(())
}
