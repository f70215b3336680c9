//! Agent lifecycle: start/stop of exporters and the collection task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use inframind_core::{AgentConfig, Collector, Exporter};

use crate::cycle::run_cycles;

/// A build step announced by the pipeline being observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLabel {
    pub stage: String,
    pub step: String,
    pub span_id: String,
}

impl StepLabel {
    pub fn new(stage: impl Into<String>, step: impl Into<String>, span_id: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            step: step.into(),
            span_id: span_id.into(),
        }
    }
}

/// Handle to the running collection task.
struct CycleHandle {
    handle: JoinHandle<Vec<Box<dyn Collector>>>,
    shutdown_tx: watch::Sender<bool>,
}

/// State only touched under the lifecycle lock.
struct Lifecycle {
    /// Parked here while stopped; moved into the collection task while running.
    collectors: Vec<Box<dyn Collector>>,
    cycle: Option<CycleHandle>,
}

/// Owns the collectors and exporters and drives the collection cycle.
///
/// Dropping a running agent closes the shutdown channel, so the collection
/// task exits at its next sleep; call [`Agent::stop`] to also stop the
/// exporters and wait for the in-flight cycle.
pub struct Agent {
    config: AgentConfig,
    running: AtomicBool,
    steps_registered: AtomicU64,
    exporters: Arc<[Arc<dyn Exporter>]>,
    lifecycle: Mutex<Lifecycle>,
}

impl Agent {
    pub fn builder(config: AgentConfig) -> AgentBuilder {
        AgentBuilder {
            config,
            collectors: Vec::new(),
            exporters: Vec::new(),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the exporters, then the collection task.
    ///
    /// Returns `false` without side effects when the agent is already
    /// running. An exporter that fails to start is logged and left inert;
    /// the rest of the agent starts normally.
    pub async fn start(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock().await;
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("agent already running");
            return false;
        }

        info!(
            port = self.config.port,
            period_ms = self.config.period_ms,
            collectors = lifecycle.collectors.len(),
            exporters = self.exporters.len(),
            "starting InfraMind agent"
        );

        for exporter in self.exporters.iter() {
            if let Err(e) = exporter.start().await {
                error!(exporter = exporter.name(), error = %e, "exporter failed to start");
            }
        }

        let collectors = std::mem::take(&mut lifecycle.collectors);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_cycles(
            collectors,
            self.exporters.clone(),
            self.config.period(),
            shutdown_rx,
        ));
        lifecycle.cycle = Some(CycleHandle {
            handle,
            shutdown_tx,
        });

        true
    }

    /// Stop the collection task after its in-flight cycle, then the exporters.
    ///
    /// A no-op when the agent is not running.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        info!("stopping InfraMind agent");

        if let Some(cycle) = lifecycle.cycle.take() {
            let _ = cycle.shutdown_tx.send(true);
            match cycle.handle.await {
                Ok(collectors) => lifecycle.collectors = collectors,
                Err(e) => error!(error = %e, "collection task panicked, collectors lost"),
            }
        }

        for exporter in self.exporters.iter() {
            exporter.stop().await;
        }

        info!("InfraMind agent stopped");
    }

    /// Record a build step marker. Informational only.
    pub fn register_step(&self, label: &StepLabel) {
        self.steps_registered.fetch_add(1, Ordering::Relaxed);
        info!(
            stage = %label.stage,
            step = %label.step,
            span_id = %label.span_id,
            "registered step"
        );
    }

    pub fn steps_registered(&self) -> u64 {
        self.steps_registered.load(Ordering::Relaxed)
    }
}

/// Collects the fixed registration lists for an [`Agent`].
pub struct AgentBuilder {
    config: AgentConfig,
    collectors: Vec<Box<dyn Collector>>,
    exporters: Vec<Arc<dyn Exporter>>,
}

impl AgentBuilder {
    pub fn collector(mut self, collector: Box<dyn Collector>) -> Self {
        self.collectors.push(collector);
        self
    }

    pub fn collectors(mut self, collectors: impl IntoIterator<Item = Box<dyn Collector>>) -> Self {
        self.collectors.extend(collectors);
        self
    }

    pub fn exporter(mut self, exporter: Arc<dyn Exporter>) -> Self {
        self.exporters.push(exporter);
        self
    }

    pub fn build(self) -> Agent {
        Agent {
            config: self.config,
            running: AtomicBool::new(false),
            steps_registered: AtomicU64::new(0),
            exporters: Arc::from(self.exporters),
            lifecycle: Mutex::new(Lifecycle {
                collectors: self.collectors,
                cycle: None,
            }),
        }
    }
}
