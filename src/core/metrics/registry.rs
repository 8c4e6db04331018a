// src/core/metrics/registry.rs

//! The per-scrape metric sink.
//!
//! A `RequestRegistry` is created by the dispatcher for exactly one scrape,
//! passed by `&mut` through every extraction routine and consumed when the
//! response body is rendered. Nothing in it is shared between requests.

use crate::core::ExporterError;
use indexmap::IndexMap;
use prometheus::{CounterVec, GaugeVec, Opts, Registry, TextEncoder};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// One `(name, labels, value)` triple emitted by an extraction routine.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
    pub labels: IndexMap<String, String>,
    pub kind: MetricKind,
}

#[derive(Debug)]
struct Family {
    help: String,
    kind: MetricKind,
    label_names: Vec<String>,
    // Keyed by label values, in label-name order.
    samples: IndexMap<Vec<String>, f64>,
}

/// Accumulates the samples of one scrape and renders them as exposition text.
#[derive(Debug)]
pub struct RequestRegistry {
    namespace: String,
    families: IndexMap<String, Family>,
}

impl RequestRegistry {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            families: IndexMap::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// An empty registry with the same namespace, for staging the samples of
    /// one extraction routine.
    pub fn scratch(&self) -> Self {
        Self::new(&self.namespace)
    }

    /// Moves every sample of `other` into this registry. Samples that clash
    /// with an existing family's kind or label names are logged and dropped.
    pub fn absorb(&mut self, other: RequestRegistry) {
        for (name, family) in other.families {
            for (values, value) in family.samples {
                let labels: Vec<(&str, &str)> = family
                    .label_names
                    .iter()
                    .map(String::as_str)
                    .zip(values.iter().map(String::as_str))
                    .collect();
                self.record_or_warn(&name, &family.help, family.kind, &labels, value);
            }
        }
    }

    /// Records a gauge sample. Rejected samples are logged and dropped.
    pub fn gauge(&mut self, name: &str, help: &str, labels: &[(&str, &str)], value: f64) {
        self.record_or_warn(name, help, MetricKind::Gauge, labels, value);
    }

    /// Records a counter sample. Rejected samples are logged and dropped.
    pub fn counter(&mut self, name: &str, help: &str, labels: &[(&str, &str)], value: f64) {
        self.record_or_warn(name, help, MetricKind::Counter, labels, value);
    }

    fn record_or_warn(
        &mut self,
        name: &str,
        help: &str,
        kind: MetricKind,
        labels: &[(&str, &str)],
        value: f64,
    ) {
        if let Err(e) = self.record(name, help, kind, labels, value) {
            warn!("Dropping sample for metric '{}': {}", name, e);
        }
    }

    /// Records one sample.
    ///
    /// Every sample of a metric name must carry the same label names as the
    /// first sample recorded under it, and keep its kind. Counters must not be
    /// negative. A sample with the same label values as an earlier one
    /// replaces it.
    pub fn record(
        &mut self,
        name: &str,
        help: &str,
        kind: MetricKind,
        labels: &[(&str, &str)],
        value: f64,
    ) -> Result<(), ExporterError> {
        if value.is_nan() {
            return Err(ExporterError::InvalidRequest("value is NaN".to_string()));
        }
        if kind == MetricKind::Counter && value < 0.0 {
            return Err(ExporterError::InvalidRequest(format!(
                "negative counter value {value}"
            )));
        }

        let name = sanitize_name(name);
        let label_names: Vec<String> = labels.iter().map(|(k, _)| sanitize_name(k)).collect();
        let label_values: Vec<String> = labels.iter().map(|(_, v)| v.to_string()).collect();

        let family = self.families.entry(name).or_insert_with(|| Family {
            help: help.to_string(),
            kind,
            label_names: label_names.clone(),
            samples: IndexMap::new(),
        });

        if family.kind != kind {
            return Err(ExporterError::InvalidRequest(format!(
                "metric already registered as {:?}",
                family.kind
            )));
        }
        if family.label_names != label_names {
            return Err(ExporterError::InvalidRequest(format!(
                "label names {:?} differ from {:?}",
                label_names, family.label_names
            )));
        }

        family.samples.insert(label_values, value);
        Ok(())
    }

    /// All recorded samples, in recording order.
    pub fn samples(&self) -> Vec<MetricSample> {
        self.families
            .iter()
            .flat_map(|(name, family)| {
                family.samples.iter().map(move |(values, value)| MetricSample {
                    name: name.clone(),
                    value: *value,
                    labels: family
                        .label_names
                        .iter()
                        .cloned()
                        .zip(values.iter().cloned())
                        .collect(),
                    kind: family.kind,
                })
            })
            .collect()
    }

    /// Looks up the value of the sample with exactly these labels.
    pub fn get(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let family = self.families.get(name)?;
        let mut values = Vec::with_capacity(family.label_names.len());
        for label_name in &family.label_names {
            let (_, v) = labels.iter().find(|(k, _)| k == label_name)?;
            values.push(v.to_string());
        }
        if values.len() != labels.len() {
            return None;
        }
        family.samples.get(&values).copied()
    }

    /// The number of samples recorded under `name`.
    pub fn count(&self, name: &str) -> usize {
        self.families.get(name).map_or(0, |f| f.samples.len())
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Renders the registry in the Prometheus text exposition format.
    ///
    /// The families are registered into a fresh `prometheus::Registry` that
    /// lives only for this call.
    pub fn encode(&self) -> Result<String, ExporterError> {
        let registry = Registry::new();

        for (name, family) in &self.families {
            let help = if family.help.is_empty() {
                name.as_str()
            } else {
                family.help.as_str()
            };
            let opts = Opts::new(name.as_str(), help).namespace(self.namespace.as_str());
            let label_names: Vec<&str> = family.label_names.iter().map(String::as_str).collect();

            let collector: Box<dyn prometheus::core::Collector> = match family.kind {
                MetricKind::Gauge => {
                    let vec = GaugeVec::new(opts, &label_names).map_err(encode_error)?;
                    for (values, value) in &family.samples {
                        let values: Vec<&str> = values.iter().map(String::as_str).collect();
                        vec.get_metric_with_label_values(&values)
                            .map_err(encode_error)?
                            .set(*value);
                    }
                    Box::new(vec)
                }
                MetricKind::Counter => {
                    let vec = CounterVec::new(opts, &label_names).map_err(encode_error)?;
                    for (values, value) in &family.samples {
                        let values: Vec<&str> = values.iter().map(String::as_str).collect();
                        vec.get_metric_with_label_values(&values)
                            .map_err(encode_error)?
                            .inc_by(*value);
                    }
                    Box::new(vec)
                }
            };
            registry.register(collector).map_err(encode_error)?;
        }

        TextEncoder::new()
            .encode_to_string(&registry.gather())
            .map_err(encode_error)
    }
}

fn encode_error(e: prometheus::Error) -> ExporterError {
    ExporterError::Internal(format!("failed to encode metrics: {e}"))
}

/// Replaces every character that is not valid in a metric or label name.
pub fn sanitize_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
