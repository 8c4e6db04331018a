// src/core/extract/cluster.rs

//! `CLUSTER INFO` extraction.

use super::info::record_field;
use crate::core::ExporterError;
use crate::core::client::Connection;
use crate::core::metrics::RequestRegistry;

/// Emits one gauge per `cluster_*` field of `CLUSTER INFO`, e.g.
/// `cluster_state` (1 for ok) and `cluster_slots_assigned`.
pub async fn extract_cluster_info(
    conn: &mut dyn Connection,
    registry: &mut RequestRegistry,
) -> Result<(), ExporterError> {
    let text = conn.query(&["CLUSTER", "INFO"]).await?.as_string()?;

    for line in text.lines() {
        if let Some((key, value)) = line.trim().split_once(':') {
            record_field(registry, key, value);
        }
    }
    Ok(())
}
