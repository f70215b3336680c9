//! One collect-then-export pass, and the loop that repeats it.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use inframind_core::{Collector, Exporter, MetricsSnapshot};

/// Run every collector in order and merge the results.
///
/// A failing (or panicking) collector is logged and skipped; its metrics are
/// simply absent from the returned snapshot. On a name collision the later
/// collector wins.
pub fn collect_cycle(collectors: &mut [Box<dyn Collector>]) -> MetricsSnapshot {
    let mut merged = MetricsSnapshot::new();

    for collector in collectors.iter_mut() {
        let result = catch_unwind(AssertUnwindSafe(|| collector.collect()));
        match result {
            Err(_) => {
                error!(collector = collector.name(), "collector panicked");
            }
            Ok(Ok(sample)) => {
                for name in sample.gauges.keys().chain(sample.counters.keys()) {
                    if merged.get(name).is_some() {
                        debug!(collector = collector.name(), metric = %name, "metric overwritten by later collector");
                    }
                }
                merged.merge(sample);
            }
            Ok(Err(e)) => {
                warn!(collector = collector.name(), error = %e, "collector failed");
            }
        }
    }

    merged
}

/// Hand the snapshot to every exporter in order. Failures are logged.
pub async fn export_cycle(exporters: &[Arc<dyn Exporter>], snapshot: Arc<MetricsSnapshot>) {
    for exporter in exporters {
        if let Err(e) = exporter.export(snapshot.clone()).await {
            warn!(exporter = exporter.name(), error = %e, "exporter failed");
        }
    }
}

/// Repeat cycles until shutdown, then hand the collectors back.
pub(crate) async fn run_cycles(
    mut collectors: Vec<Box<dyn Collector>>,
    exporters: Arc<[Arc<dyn Exporter>]>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Vec<Box<dyn Collector>> {
    let mut cycles: u64 = 0;

    loop {
        let started = Instant::now();

        // Collectors do blocking file reads; keep them off the async workers.
        let (returned, snapshot) = match tokio::task::spawn_blocking(move || {
            let snapshot = collect_cycle(&mut collectors);
            (collectors, snapshot)
        })
        .await
        {
            Ok(pair) => pair,
            Err(e) => {
                error!(error = %e, "collection task failed, stopping loop");
                return Vec::new();
            }
        };
        collectors = returned;

        let snapshot = Arc::new(snapshot);
        let metrics = snapshot.len();
        export_cycle(&exporters, snapshot).await;

        cycles += 1;
        let elapsed = started.elapsed();
        debug!(cycle = cycles, metrics, elapsed_ms = elapsed.as_millis() as u64, "cycle complete");

        if *shutdown.borrow() {
            break;
        }

        // Overruns get no sleep and no catch-up.
        let remaining = period.saturating_sub(elapsed);
        if remaining.is_zero() {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                period_ms = period.as_millis() as u64,
                "cycle overran its period"
            );
        }

        tokio::select! {
            _ = tokio::time::sleep(remaining) => {}
            _ = shutdown.changed() => break,
        }
    }

    debug!(cycles, "collection loop stopped");
    collectors
}
