//! inframind-core — shared types for the InfraMind telemetry agent.
//!
//! Collectors produce [`MetricsSnapshot`]s, the agent merges them once per
//! cycle, and exporters consume the merged result.
//!
//! # Architecture
//!
//! ```text
//! Collector::collect() ─┐
//! Collector::collect() ─┼─► merge ─► Arc<MetricsSnapshot> ─► Exporter::export()
//! Collector::collect() ─┘
//! ```

pub mod collector;
pub mod config;
pub mod error;
pub mod exporter;
pub mod snapshot;

pub use collector::Collector;
pub use config::{AgentConfig, CollectorsConfig, LogLevel};
pub use error::{CollectorError, ConfigError, ExporterError};
pub use exporter::Exporter;
pub use snapshot::{MetricKind, MetricsSnapshot};
