// src/core/extract/latency.rs

//! `LATENCY LATEST` extraction.
//!
//! Each entry is `[event, last_spike_unix_time, latest_ms, max_ms]`.

use crate::core::ExporterError;
use crate::core::client::Connection;
use crate::core::metrics::RequestRegistry;

pub async fn extract_latency(
    conn: &mut dyn Connection,
    registry: &mut RequestRegistry,
) -> Result<(), ExporterError> {
    let events = conn.query(&["LATENCY", "LATEST"]).await?.into_sequence()?;

    for event in events {
        let fields = event.into_sequence()?;
        if fields.len() < 3 {
            continue;
        }
        let name = fields[0].as_string()?;
        let labels = [("event_name", name.as_str())];

        registry.gauge(
            "latency_spike_last",
            "When the latency spike last occurred",
            &labels,
            fields[1].as_f64()?,
        );
        registry.gauge(
            "latency_spike_duration_seconds",
            "Length of the last latency spike in seconds",
            &labels,
            fields[2].as_f64()? / 1e3,
        );
    }
    Ok(())
}
