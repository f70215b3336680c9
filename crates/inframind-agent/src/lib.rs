//! inframind-agent — the collection scheduler.
//!
//! The [`Agent`] owns an ordered list of collectors and exporters. Once
//! started it runs one cycle per configured period on its own task:
//!
//! ```text
//! loop {
//!   start = now
//!   for c in collectors  → c.collect()  (errors logged, skipped)
//!   merge                → Arc<MetricsSnapshot>
//!   for e in exporters   → e.export()   (errors logged, skipped)
//!   sleep(period - elapsed)             ← stop() observed here
//! }
//! ```
//!
//! Cycles never overlap and are never coalesced: a cycle that overruns the
//! period is followed immediately by the next one.

pub mod agent;
pub mod cycle;

pub use agent::{Agent, AgentBuilder, StepLabel};
pub use cycle::{collect_cycle, export_cycle};
