//! Build-cache collector.
//!
//! Build tooling records cache lookups into a shared [`CacheStats`] handle
//! (lock-free atomics); the collector reads the running totals each cycle.
//! A process with no in-process recorder can instead point the collector at
//! a `ccache --print-stats` dump, which is re-read every cycle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use inframind_core::{Collector, CollectorError, MetricsSnapshot};

#[derive(Debug, Default)]
struct Counts {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Shared hit/miss counters. Cloning shares the same counters.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    counts: Arc<Counts>,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.counts.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.counts.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Add totals reported in bulk, e.g. parsed from a cache tool's summary.
    pub fn record(&self, hits: u64, misses: u64) {
        self.counts.hits.fetch_add(hits, Ordering::Relaxed);
        self.counts.misses.fetch_add(misses, Ordering::Relaxed);
    }

    /// Replace the totals with absolute values from an external source.
    pub fn set(&self, hits: u64, misses: u64) {
        self.counts.hits.store(hits, Ordering::Relaxed);
        self.counts.misses.store(misses, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.counts.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.counts.misses.load(Ordering::Relaxed)
    }

    /// Fraction of lookups that hit. Zero when nothing was looked up.
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits();
        let lookups = hits + self.misses();
        if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        }
    }
}

/// Parse tab-separated `ccache --print-stats` output into (hits, misses).
///
/// Hits are direct plus preprocessed hits. Unknown keys are ignored; a dump
/// with none of the three counters is rejected.
pub fn parse_ccache_stats(content: &str) -> Result<(u64, u64), String> {
    let mut hits = 0u64;
    let mut misses = 0u64;
    let mut seen = false;

    for line in content.lines() {
        let Some((key, value)) = line.split_once('\t') else {
            continue;
        };
        let slot = match key.trim() {
            "direct_cache_hit" | "preprocessed_cache_hit" => &mut hits,
            "cache_miss" => &mut misses,
            _ => continue,
        };
        let value: u64 = value
            .trim()
            .parse()
            .map_err(|e| format!("bad value for {}: {e}", key.trim()))?;
        *slot += value;
        seen = true;
    }

    if !seen {
        return Err("no cache hit/miss counters found".into());
    }
    Ok((hits, misses))
}

pub struct CacheCollector {
    stats: CacheStats,
    stats_file: Option<PathBuf>,
}

impl CacheCollector {
    pub fn new(stats: CacheStats) -> Self {
        Self {
            stats,
            stats_file: None,
        }
    }

    /// Refresh the shared totals from a ccache stats dump before each sample.
    pub fn with_stats_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stats_file = Some(path.into());
        self
    }

    fn refresh(&self, path: &Path) -> Result<(), CollectorError> {
        let content = std::fs::read_to_string(path).map_err(|e| CollectorError::io(path, e))?;
        let (hits, misses) = parse_ccache_stats(&content).map_err(|r| CollectorError::parse(path, r))?;
        self.stats.set(hits, misses);
        Ok(())
    }
}

impl Collector for CacheCollector {
    fn name(&self) -> &str {
        "cache"
    }

    fn collect(&mut self) -> Result<MetricsSnapshot, CollectorError> {
        if let Some(path) = &self.stats_file {
            self.refresh(path)?;
        }

        Ok(MetricsSnapshot::new()
            .with_gauge("im_cache_hit_ratio", self.stats.hit_ratio())
            .with_counter("im_cache_hits_total", self.stats.hits() as f64)
            .with_counter("im_cache_misses_total", self.stats.misses() as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits(), 0);
        assert_eq!(stats.hit_ratio(), 0.0);
    }

    #[test]
    fn clones_share_counters() {
        let stats = CacheStats::new();
        let recorder = stats.clone();
        recorder.record_hit();
        recorder.record_hit();
        recorder.record_hit();
        recorder.record_miss();

        assert_eq!(stats.hits(), 3);
        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.hit_ratio(), 0.75);
    }

    #[test]
    fn collect_reports_totals() {
        let stats = CacheStats::new();
        stats.record(100, 25);

        let snap = CacheCollector::new(stats.clone()).collect().unwrap();
        assert_eq!(snap.gauges["im_cache_hit_ratio"], 0.8);
        assert_eq!(snap.counters["im_cache_hits_total"], 100.0);
        assert_eq!(snap.counters["im_cache_misses_total"], 25.0);
    }

    const CCACHE_DUMP: &str = "stats_updated_timestamp\t1760000000\n\
direct_cache_hit\t70\n\
preprocessed_cache_hit\t10\n\
cache_miss\t20\n\
files_in_cache\t512\n";

    #[test]
    fn parse_ccache_dump() {
        assert_eq!(parse_ccache_stats(CCACHE_DUMP).unwrap(), (80, 20));
    }

    #[test]
    fn parse_ccache_rejects_unrelated_dump() {
        assert!(parse_ccache_stats("files_in_cache\t512\n").is_err());
        assert!(parse_ccache_stats("cache_miss\tmany\n").is_err());
    }

    #[test]
    fn stats_file_refreshes_totals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ccache.stats");
        std::fs::write(&path, CCACHE_DUMP).unwrap();

        let stats = CacheStats::new();
        let mut collector = CacheCollector::new(stats.clone()).with_stats_file(&path);
        let snap = collector.collect().unwrap();
        assert_eq!(snap.counters["im_cache_hits_total"], 80.0);
        assert_eq!(snap.gauges["im_cache_hit_ratio"], 0.8);

        // Absolute totals: a later dump replaces, never adds.
        std::fs::write(&path, "direct_cache_hit\t90\ncache_miss\t30\n").unwrap();
        let snap = collector.collect().unwrap();
        assert_eq!(snap.counters["im_cache_hits_total"], 90.0);
        assert_eq!(snap.counters["im_cache_misses_total"], 30.0);
        assert_eq!(stats.hits(), 90);
    }

    #[test]
    fn missing_stats_file_fails() {
        let mut collector =
            CacheCollector::new(CacheStats::new()).with_stats_file("/nonexistent/ccache.stats");
        assert!(matches!(collector.collect(), Err(CollectorError::Io { .. })));
    }
}
