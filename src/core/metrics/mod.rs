// src/core/metrics/mod.rs

//! Metric collection for the exporter.
//!
//! Scrape results go into a [`RequestRegistry`] owned by one request. The
//! only process-wide metric state is the scrape counter below and the
//! `process_*` collector of prometheus' default registry.

pub mod registry;

pub use registry::{MetricKind, MetricSample, RequestRegistry};

use lazy_static::lazy_static;
use prometheus::{IntCounter, TextEncoder};

lazy_static! {
    /// The total number of scrapes this process has started.
    ///
    /// Kept outside any registry: it is copied into each response under the
    /// configured namespace.
    pub static ref SCRAPES_TOTAL: IntCounter =
        IntCounter::new("exporter_scrapes_total", "Current total redis scrapes.").unwrap();
}

/// Encodes the families of the default registry (the `process_*` metrics on
/// Linux) in the Prometheus text format.
pub fn gather_process_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
