// src/core/extract/config.rs

//! `CONFIG GET *` extraction.

use crate::core::ExporterError;
use crate::core::client::Connection;
use crate::core::metrics::RequestRegistry;

/// Configuration parameters exported as gauges, with their metric names.
const RENAMED_CONFIG_KEYS: &[(&str, &str)] = &[
    ("maxmemory", "config_maxmemory"),
    ("maxclients", "config_maxclients"),
    ("io-threads", "config_io_threads"),
];

/// Emits the renamed configuration gauges and the client output buffer limits.
/// Returns the value of `databases`, if the server reported one.
pub async fn extract_config(
    conn: &mut dyn Connection,
    registry: &mut RequestRegistry,
) -> Result<Option<u32>, ExporterError> {
    let config = conn.query(&["CONFIG", "GET", "*"]).await?.into_field_map()?;

    let mut databases = None;
    for (key, value) in &config {
        let Ok(value) = value.as_string() else {
            continue;
        };

        if key == "databases" {
            databases = value.parse::<u32>().ok();
            continue;
        }

        if key == "client-output-buffer-limit" {
            record_buffer_limits(registry, &value);
            continue;
        }

        if let Some((_, name)) = RENAMED_CONFIG_KEYS.iter().find(|(k, _)| k == key) {
            if let Ok(v) = value.parse::<f64>() {
                registry.gauge(name, "", &[], v);
            }
        }
    }

    Ok(databases)
}

/// `normal 0 0 0 slave 268435456 67108864 60 pubsub 33554432 8388608 60`
fn record_buffer_limits(registry: &mut RequestRegistry, value: &str) {
    let fields: Vec<&str> = value.split_ascii_whitespace().collect();
    for chunk in fields.chunks_exact(4) {
        let class = chunk[0];
        if let Ok(hard) = chunk[1].parse::<f64>() {
            registry.gauge(
                "config_client_output_buffer_limit_bytes",
                "The configured buffer limits per class",
                &[("class", class), ("limit", "hard")],
                hard,
            );
        }
        if let Ok(soft) = chunk[2].parse::<f64>() {
            registry.gauge(
                "config_client_output_buffer_limit_bytes",
                "The configured buffer limits per class",
                &[("class", class), ("limit", "soft")],
                soft,
            );
        }
        if let Ok(seconds) = chunk[3].parse::<f64>() {
            registry.gauge(
                "config_client_output_buffer_limit_overcome_seconds",
                "How long for buffer limits per class to be exceeded before replicas are dropped",
                &[("class", class), ("limit", "soft")],
                seconds,
            );
        }
    }
}
