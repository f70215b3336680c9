//! Process read/write bytes from `/proc/self/io`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use inframind_core::{Collector, CollectorError, MetricsSnapshot};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoBytes {
    pub read: u64,
    pub write: u64,
}

pub fn parse_proc_io(content: &str) -> Result<IoBytes, String> {
    let mut bytes = IoBytes::default();
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let slot = match key {
            "read_bytes:" => &mut bytes.read,
            "write_bytes:" => &mut bytes.write,
            _ => continue,
        };
        *slot = value
            .parse()
            .map_err(|e| format!("bad value for {key} {value:?}: {e}"))?;
    }
    Ok(bytes)
}

pub struct IoCollector {
    path: PathBuf,
    prev: Option<IoBytes>,
}

impl IoCollector {
    pub fn new(proc_root: &Path) -> Self {
        Self {
            path: proc_root.join("self").join("io"),
            prev: None,
        }
    }
}

impl Collector for IoCollector {
    fn name(&self) -> &str {
        "io"
    }

    fn collect(&mut self) -> Result<MetricsSnapshot, CollectorError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // Not every kernel exposes per-process io accounting.
                debug!(path = %self.path.display(), "io accounting unavailable, reporting zeros");
                return Ok(MetricsSnapshot::new()
                    .with_gauge("im_io_read_bytes", 0.0)
                    .with_gauge("im_io_write_bytes", 0.0));
            }
            Err(e) => return Err(CollectorError::io(&self.path, e)),
        };
        let current = parse_proc_io(&content).map_err(|r| CollectorError::parse(&self.path, r))?;

        let (read_delta, write_delta) = match self.prev {
            Some(prev) => (
                current.read.saturating_sub(prev.read),
                current.write.saturating_sub(prev.write),
            ),
            None => (0, 0),
        };
        self.prev = Some(current);

        Ok(MetricsSnapshot::new()
            .with_counter("im_io_read_bytes_total", current.read as f64)
            .with_counter("im_io_write_bytes_total", current.write as f64)
            .with_gauge("im_io_read_bytes_per_cycle", read_delta as f64)
            .with_gauge("im_io_write_bytes_per_cycle", write_delta as f64))
    }
}
