//! Metric snapshots, the unit of data flowing from collectors to exporters.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a single metric, as announced in the exposition `# TYPE` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Gauge => write!(f, "gauge"),
            MetricKind::Counter => write!(f, "counter"),
        }
    }
}

/// Point-in-time mapping of metric names to values.
///
/// Both maps are ordered, so iteration is always sorted by name. A name is
/// expected to live in only one of the two maps; that is a collector
/// contract and is not checked here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub gauges: BTreeMap<String, f64>,
    pub counters: BTreeMap<String, f64>,
}

impl MetricsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gauge(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set_gauge(name, value);
        self
    }

    pub fn with_counter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set_counter(name, value);
        self
    }

    pub fn set_gauge(&mut self, name: impl Into<String>, value: f64) {
        self.gauges.insert(name.into(), value);
    }

    pub fn set_counter(&mut self, name: impl Into<String>, value: f64) {
        self.counters.insert(name.into(), value);
    }

    /// Union `other` into `self`. Values from `other` win on collision.
    pub fn merge(&mut self, other: MetricsSnapshot) {
        self.gauges.extend(other.gauges);
        self.counters.extend(other.counters);
    }

    /// Look up a metric in either map.
    pub fn get(&self, name: &str) -> Option<(MetricKind, f64)> {
        self.gauges
            .get(name)
            .map(|v| (MetricKind::Gauge, *v))
            .or_else(|| self.counters.get(name).map(|v| (MetricKind::Counter, *v)))
    }

    pub fn len(&self) -> usize {
        self.gauges.len() + self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty() && self.counters.is_empty()
    }

    /// All metrics sorted by name, gauges and counters interleaved.
    pub fn metrics(&self) -> Vec<(&str, MetricKind, f64)> {
        let mut all: Vec<(&str, MetricKind, f64)> = self
            .gauges
            .iter()
            .map(|(name, value)| (name.as_str(), MetricKind::Gauge, *value))
            .chain(
                self.counters
                    .iter()
                    .map(|(name, value)| (name.as_str(), MetricKind::Counter, *value)),
            )
            .collect();
        all.sort_by(|a, b| a.0.cmp(b.0).then(a.1.cmp(&b.1)));
        all
    }
}
