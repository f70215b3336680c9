//! Exporter contract.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ExporterError;
use crate::snapshot::MetricsSnapshot;

/// Makes merged snapshots available to an external consumer.
///
/// The agent calls `start` and `stop` in registration order and `export`
/// once per cycle from the collection task. Errors are logged by the agent
/// and never stop the cycle.
#[async_trait]
pub trait Exporter: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self) -> Result<(), ExporterError>;

    async fn stop(&self);

    async fn export(&self, snapshot: Arc<MetricsSnapshot>) -> Result<(), ExporterError>;
}
