//! Prometheus text exposition format.
//!
//! Renders a snapshot into the text format scraped by a Prometheus server
//! or compatible agent.

use inframind_core::MetricsSnapshot;

/// Render a snapshot into Prometheus text format.
///
/// One `# TYPE` line plus one sample line per metric, ordered by name with
/// gauges and counters interleaved. An empty snapshot renders as an empty
/// document.
pub fn render_prometheus(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::new();
    for (name, kind, value) in snapshot.metrics() {
        out.push_str(&format!("# TYPE {name} {kind}\n"));
        out.push_str(&format!("{name} {}\n", format_value(value)));
    }
    out
}

/// Format a sample value the way the exposition format expects.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else {
        // Debug keeps the decimal point on whole numbers (1.0, not 1).
        format!("{value:?}")
    }
}
