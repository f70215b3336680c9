//! Aggregate CPU utilisation from `/proc/stat`.

use std::path::{Path, PathBuf};

use inframind_core::{Collector, CollectorError, MetricsSnapshot};

/// Kernel clock ticks per second (`USER_HZ`).
const USER_HZ: f64 = 100.0;

/// Tick counters from the aggregate `cpu` line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    /// Idle time including time spent waiting on I/O.
    pub fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }
}

/// Parse the aggregate `cpu` line out of `/proc/stat` content.
///
/// The first four fields are required; older kernels omit the rest, which
/// then count as zero.
pub fn parse_proc_stat(content: &str) -> Result<CpuTimes, String> {
    let line = content
        .lines()
        .find(|l| l.split_whitespace().next() == Some("cpu"))
        .ok_or_else(|| "no aggregate cpu line".to_string())?;

    let fields = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|f| f.parse::<u64>().map_err(|e| format!("bad tick value {f:?}: {e}")))
        .collect::<Result<Vec<u64>, String>>()?;

    if fields.len() < 4 {
        return Err(format!("expected at least 4 tick fields, got {}", fields.len()));
    }

    let field = |i: usize| fields.get(i).copied().unwrap_or(0);
    Ok(CpuTimes {
        user: field(0),
        nice: field(1),
        system: field(2),
        idle: field(3),
        iowait: field(4),
        irq: field(5),
        softirq: field(6),
        steal: field(7),
    })
}

/// Usage percentage between two samples. Zero when no time has elapsed.
pub fn usage_percent(prev: &CpuTimes, current: &CpuTimes) -> f64 {
    let total_diff = current.total().saturating_sub(prev.total());
    let idle_diff = current.idle_total().saturating_sub(prev.idle_total());
    if total_diff == 0 {
        return 0.0;
    }
    100.0 * (1.0 - idle_diff as f64 / total_diff as f64)
}

pub struct CpuCollector {
    path: PathBuf,
    prev: Option<CpuTimes>,
}

impl CpuCollector {
    pub fn new(proc_root: &Path) -> Self {
        Self {
            path: proc_root.join("stat"),
            prev: None,
        }
    }
}

impl Collector for CpuCollector {
    fn name(&self) -> &str {
        "cpu"
    }

    fn collect(&mut self) -> Result<MetricsSnapshot, CollectorError> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| CollectorError::io(&self.path, e))?;
        let current = parse_proc_stat(&content).map_err(|r| CollectorError::parse(&self.path, r))?;

        // First sample has nothing to diff against.
        let usage = self
            .prev
            .map(|prev| usage_percent(&prev, &current))
            .unwrap_or(0.0);
        self.prev = Some(current);

        Ok(MetricsSnapshot::new()
            .with_gauge("im_cpu_usage_percent", usage)
            .with_counter("im_cpu_user_seconds_total", current.user as f64 / USER_HZ)
            .with_counter("im_cpu_system_seconds_total", current.system as f64 / USER_HZ))
    }
}
