//! inframind-collectors — built-in metric sources.
//!
//! Every collector reads from a configurable procfs root so it can be
//! pointed at a fixture tree in tests. Parsing lives in pure functions
//! next to each collector.
//!
//! | collector | source | metrics |
//! |-----------|--------|---------|
//! | `cpu`     | `<root>/stat`    | usage percent, user/system seconds |
//! | `memory`  | `<root>/meminfo` | total, used, available, cached bytes |
//! | `io`      | `<root>/self/io` | read/write bytes |
//! | `cache`   | [`CacheStats`] or a ccache stats dump | hits, misses, hit ratio |

pub mod cache;
pub mod cpu;
pub mod io;
pub mod memory;

use inframind_core::{Collector, CollectorsConfig};
use tracing::info;

pub use cache::{CacheCollector, CacheStats, parse_ccache_stats};
pub use cpu::CpuCollector;
pub use io::IoCollector;
pub use memory::MemoryCollector;

/// Build the enabled collectors in their fixed order: cpu, memory, io, cache.
pub fn build_collectors(config: &CollectorsConfig, cache_stats: CacheStats) -> Vec<Box<dyn Collector>> {
    let mut collectors: Vec<Box<dyn Collector>> = Vec::new();

    if config.cpu {
        collectors.push(Box::new(CpuCollector::new(&config.proc_root)));
    }
    if config.memory {
        collectors.push(Box::new(MemoryCollector::new(&config.proc_root)));
    }
    if config.io {
        collectors.push(Box::new(IoCollector::new(&config.proc_root)));
    }
    if config.cache {
        let mut cache = CacheCollector::new(cache_stats);
        if let Some(path) = &config.cache_stats_file {
            cache = cache.with_stats_file(path);
        }
        collectors.push(Box::new(cache));
    }

    info!(
        count = collectors.len(),
        proc_root = %config.proc_root.display(),
        "collectors initialized"
    );
    collectors
}
