//! inframind-exporters — where merged snapshots go.
//!
//! # Architecture
//!
//! ```text
//! Agent cycle ──export()──┬──► LoggingExporter ──► one JSON line (debug level)
//!                         │
//!                         └──► PrometheusExporter
//!                                ├── latest: RwLock<Arc<MetricsSnapshot>>  (swap on export)
//!                                └── accept loop ──► task per connection
//!                                                     └── render_prometheus()
//! ```

pub mod logging;
pub mod prometheus;
pub mod server;

pub use logging::LoggingExporter;
pub use prometheus::{format_value, render_prometheus};
pub use server::{PrometheusExporter, ServeState};
