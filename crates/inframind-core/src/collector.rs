//! Collector contract.

use crate::error::CollectorError;
use crate::snapshot::MetricsSnapshot;

/// Samples one category of system metrics on demand.
///
/// `collect` is called from a single task, once per cycle, in registration
/// order. Implementations may keep previous-sample state in `self` to
/// compute rates; that state is never shared with other tasks.
pub trait Collector: Send {
    /// Stable identifier used in diagnostics.
    fn name(&self) -> &str;

    /// Take one synchronous sample.
    fn collect(&mut self) -> Result<MetricsSnapshot, CollectorError>;
}
