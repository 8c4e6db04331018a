// src/core/extract/slowlog.rs

//! Slow log extraction.
//!
//! A `SLOWLOG GET` entry is `[id, timestamp, duration_us, [cmd, args...], ...]`.

use crate::core::ExporterError;
use crate::core::client::Connection;
use crate::core::metrics::RequestRegistry;
use crate::core::protocol::ReplyValue;
use tracing::debug;

/// One decoded slow log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SlowLogEntry {
    pub id: i64,
    pub timestamp: i64,
    pub duration_seconds: f64,
    pub command: String,
}

impl SlowLogEntry {
    /// Decodes an entry. Returns `Ok(None)` for entries shorter than four
    /// elements.
    pub fn decode(value: &ReplyValue) -> Result<Option<Self>, ExporterError> {
        let fields = value.as_sequence()?;
        if fields.len() < 4 {
            return Ok(None);
        }
        let command = fields[3]
            .as_sequence()?
            .first()
            .ok_or(ExporterError::ShapeMismatch {
                expected: "text",
                actual: "sequence",
            })?
            .as_string()?;

        Ok(Some(Self {
            id: fields[0].as_i64()?,
            timestamp: fields[1].as_i64()?,
            duration_seconds: fields[2].as_i64()? as f64 / 1e6,
            command,
        }))
    }
}

/// Emits `slowlog_length`, `slowlog_last_id` and
/// `last_slow_execution_duration_seconds`.
pub async fn extract_slowlog(
    conn: &mut dyn Connection,
    registry: &mut RequestRegistry,
) -> Result<(), ExporterError> {
    match conn.query(&["SLOWLOG", "LEN"]).await.and_then(|r| r.as_i64()) {
        Ok(length) => registry.gauge(
            "slowlog_length",
            "Total slowlog",
            &[],
            length as f64,
        ),
        Err(e) => debug!("SLOWLOG LEN failed: {}", e),
    }

    let entries = conn.query(&["SLOWLOG", "GET", "1"]).await?.into_sequence()?;

    // No entries yet, or an entry without id, timestamp and duration, both
    // report zero.
    let (last_id, last_duration) = entries
        .first()
        .and_then(|entry| entry.as_sequence().ok())
        .and_then(|fields| {
            let id = fields.first()?.as_i64().ok()?;
            fields.get(1)?.as_i64().ok()?;
            let duration_us = fields.get(2)?.as_i64().ok()?;
            Some((id, duration_us as f64 / 1e6))
        })
        .unwrap_or((0, 0.0));

    registry.gauge("slowlog_last_id", "Last id of slowlog", &[], last_id as f64);
    registry.gauge(
        "last_slow_execution_duration_seconds",
        "The amount of time needed for last slow execution, in seconds",
        &[],
        last_duration,
    );
    Ok(())
}

/// Emits one `slowlog_history_last_ten{timestamp,cmd}` sample per entry of the
/// last `count` slow log entries.
pub async fn extract_slowlog_history(
    conn: &mut dyn Connection,
    registry: &mut RequestRegistry,
    count: usize,
) -> Result<(), ExporterError> {
    let entries = conn
        .query(&["SLOWLOG", "GET", &count.to_string()])
        .await?
        .into_sequence()?;

    for entry in &entries {
        match SlowLogEntry::decode(entry) {
            Ok(Some(entry)) => {
                let timestamp = entry.timestamp.to_string();
                registry.gauge(
                    "slowlog_history_last_ten",
                    "Duration of the most recent slow log entries, in seconds",
                    &[("timestamp", timestamp.as_str()), ("cmd", entry.command.as_str())],
                    entry.duration_seconds,
                );
            }
            Ok(None) => {}
            Err(e) => debug!("Skipping slow log entry: {}", e),
        }
    }
    Ok(())
}
