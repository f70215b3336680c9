//! One JSON line per cycle, emitted at debug level.
//!
//! The line is written to stdout by default so a log shipper can pick it
//! up alongside the agent's own tracing output.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use inframind_core::{Exporter, ExporterError, LogLevel, MetricsSnapshot};

#[derive(Serialize)]
struct MetricsRecord<'a> {
    ts: String,
    gauges: &'a BTreeMap<String, f64>,
    counters: &'a BTreeMap<String, f64>,
}

pub struct LoggingExporter {
    level: LogLevel,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl LoggingExporter {
    pub fn new(level: LogLevel) -> Self {
        Self::with_sink(level, Box::new(std::io::stdout()))
    }

    pub fn with_sink(level: LogLevel, sink: Box<dyn Write + Send>) -> Self {
        Self {
            level,
            sink: Mutex::new(sink),
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }
}

/// Serialize a snapshot as a single JSON record stamped with UTC time.
///
/// Non-finite values serialize as `null`.
pub fn format_record(snapshot: &MetricsSnapshot) -> Result<String, ExporterError> {
    let record = MetricsRecord {
        ts: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        gauges: &snapshot.gauges,
        counters: &snapshot.counters,
    };
    Ok(serde_json::to_string(&record)?)
}

#[async_trait]
impl Exporter for LoggingExporter {
    fn name(&self) -> &str {
        "logging"
    }

    async fn start(&self) -> Result<(), ExporterError> {
        info!(level = %self.level, "logging exporter started");
        Ok(())
    }

    async fn stop(&self) {
        info!("logging exporter stopped");
    }

    async fn export(&self, snapshot: Arc<MetricsSnapshot>) -> Result<(), ExporterError> {
        if self.level != LogLevel::Debug {
            return Ok(());
        }

        let line = format_record(&snapshot)?;
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(sink, "{line}")?;
        sink.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Write sink the test can read back.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn test_snapshot() -> Arc<MetricsSnapshot> {
        Arc::new(
            MetricsSnapshot::new()
                .with_gauge("im_cpu_usage_percent", 12.5)
                .with_counter("im_io_read_bytes_total", 4096.0),
        )
    }

    #[tokio::test]
    async fn debug_level_writes_one_json_line() {
        let buf = SharedBuf::default();
        let exporter = LoggingExporter::with_sink(LogLevel::Debug, Box::new(buf.clone()));

        exporter.export(test_snapshot()).await.unwrap();

        let output = buf.contents();
        assert_eq!(output.lines().count(), 1);

        let record: serde_json::Value = serde_json::from_str(output.trim_end()).unwrap();
        assert_eq!(record["gauges"]["im_cpu_usage_percent"], 12.5);
        assert_eq!(record["counters"]["im_io_read_bytes_total"], 4096.0);

        let ts = record["ts"].as_str().unwrap();
        assert!(ts.ends_with('Z'), "timestamp should be UTC: {ts}");
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok(), "bad timestamp: {ts}");
    }

    #[tokio::test]
    async fn info_level_is_silent() {
        let buf = SharedBuf::default();
        let exporter = LoggingExporter::with_sink(LogLevel::Info, Box::new(buf.clone()));

        exporter.export(test_snapshot()).await.unwrap();
        assert!(buf.contents().is_empty());
    }

    #[tokio::test]
    async fn one_line_per_export() {
        let buf = SharedBuf::default();
        let exporter = LoggingExporter::with_sink(LogLevel::Debug, Box::new(buf.clone()));

        exporter.export(test_snapshot()).await.unwrap();
        exporter.export(Arc::new(MetricsSnapshot::new())).await.unwrap();

        let output = buf.contents();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\"gauges\":{},\"counters\":{}"));
    }

    #[test]
    fn non_finite_values_do_not_fail() {
        let snap = MetricsSnapshot::new()
            .with_gauge("nan", f64::NAN)
            .with_gauge("inf", f64::INFINITY);
        let line = format_record(&snap).unwrap();
        assert!(line.contains("\"nan\":null"));
        assert!(line.contains("\"inf\":null"));
    }

    #[tokio::test]
    async fn lifecycle_markers_succeed() {
        let exporter = LoggingExporter::new(LogLevel::Info);
        assert_eq!(exporter.name(), "logging");
        exporter.start().await.unwrap();
        exporter.stop().await;
    }
}
