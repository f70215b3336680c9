//! Memory collector (`/proc/meminfo`).

use std::path::{Path, PathBuf};

use inframind_core::{Collector, CollectorError, MetricsSnapshot};

/// Byte values of the `/proc/meminfo` fields the agent reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub total: u64,
    pub free: u64,
    pub available: u64,
    pub buffers: u64,
    pub cached: u64,
}

impl MemInfo {
    pub fn used(&self) -> u64 {
        self.total
            .saturating_sub(self.free)
            .saturating_sub(self.buffers)
            .saturating_sub(self.cached)
    }
}

/// Parse `/proc/meminfo` content. Values are reported in kB.
pub fn parse_meminfo(content: &str) -> Result<MemInfo, String> {
    let mut info = MemInfo::default();
    let mut saw_total = false;

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let slot = match key {
            "MemTotal:" => {
                saw_total = true;
                &mut info.total
            }
            "MemFree:" => &mut info.free,
            "MemAvailable:" => &mut info.available,
            "Buffers:" => &mut info.buffers,
            "Cached:" => &mut info.cached,
            _ => continue,
        };
        let kb: u64 = value
            .parse()
            .map_err(|e| format!("bad value for {key} {value:?}: {e}"))?;
        *slot = kb * 1024;
    }

    if !saw_total {
        return Err("missing MemTotal".to_string());
    }
    Ok(info)
}

pub struct MemoryCollector {
    path: PathBuf,
}

impl MemoryCollector {
    pub fn new(proc_root: &Path) -> Self {
        Self {
            path: proc_root.join("meminfo"),
        }
    }
}

impl Collector for MemoryCollector {
    fn name(&self) -> &str {
        "memory"
    }

    fn collect(&mut self) -> Result<MetricsSnapshot, CollectorError> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| CollectorError::io(&self.path, e))?;
        let info = parse_meminfo(&content).map_err(|r| CollectorError::parse(&self.path, r))?;

        Ok(MetricsSnapshot::new()
            .with_gauge("im_mem_total_bytes", info.total as f64)
            .with_gauge("im_mem_used_bytes", info.used() as f64)
            .with_gauge("im_mem_available_bytes", info.available as f64)
            .with_gauge("im_mem_cached_bytes", info.cached as f64))
    }
}
