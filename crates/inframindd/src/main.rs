//! inframindd — the InfraMind telemetry agent daemon.
//!
//! Assembles the agent:
//! - Collectors (cpu, memory, io, cache) per config
//! - Prometheus scrape endpoint
//! - JSON metrics log (debug level)
//!
//! # Usage
//!
//! ```text
//! inframindd --config /etc/inframind/inframind.toml --port 9102 --log-level debug
//! inframindd --json-logs
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use inframind_agent::Agent;
use inframind_collectors::{CacheStats, build_collectors};
use inframind_core::{AgentConfig, CollectorsConfig, LogLevel};
use inframind_exporters::{LoggingExporter, PrometheusExporter};

#[derive(Parser)]
#[command(name = "inframindd", version, about = "InfraMind telemetry agent")]
struct Cli {
    /// Path to an inframind.toml config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Collection period in milliseconds.
    #[arg(long)]
    period_ms: Option<u64>,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long)]
    port: Option<u16>,

    /// Metrics log verbosity: "info" or "debug".
    #[arg(long)]
    log_level: Option<LogLevel>,

    /// Emit the agent's own logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Defaults, then the config file, then flags.
    fn resolve_config(&self) -> anyhow::Result<AgentConfig> {
        let mut config = match &self.config {
            Some(path) => AgentConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => AgentConfig::default(),
        };

        if let Some(period_ms) = self.period_ms {
            config.period_ms = period_ms;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    let default_filter = match config.log_level {
        LogLevel::Debug => "info,inframind=debug",
        LogLevel::Info => "info",
    };
    let subscriber = tracing_subscriber::fmt().with_env_filter(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
    );
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "InfraMind telemetry agent");

    // ── Assemble ───────────────────────────────────────────────

    let collectors = build_collectors(&daemon_collectors(&config.collectors), CacheStats::new());

    let prometheus = Arc::new(PrometheusExporter::new(config.listen_addr()));
    let logging = Arc::new(LoggingExporter::new(config.log_level));

    let agent = Agent::builder(config)
        .collectors(collectors)
        .exporter(prometheus)
        .exporter(logging)
        .build();

    if !agent.start().await {
        anyhow::bail!("failed to start agent");
    }

    info!("agent running, press Ctrl+C to stop");

    // ── Wait for shutdown ──────────────────────────────────────

    shutdown_signal().await?;
    info!("shutdown signal received");

    agent.stop().await;
    info!("agent stopped gracefully");
    Ok(())
}

/// The daemon has no in-process cache recorder, so the cache collector only
/// runs when it has a stats file to read.
fn daemon_collectors(config: &CollectorsConfig) -> CollectorsConfig {
    let mut config = config.clone();
    if config.cache && config.cache_stats_file.is_none() {
        info!("cache collector disabled: no cache_stats_file configured");
        config.cache = false;
    }
    config
}

#[cfg(unix)]
async fn shutdown_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("failed to listen for Ctrl+C")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from(["inframindd", "--period-ms", "250", "--log-level", "debug"]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.period_ms, 250);
        assert_eq!(config.port, 9102);
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "period_ms = 500\nport = 9300").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::parse_from(["inframindd", "--config", path.as_str(), "--port", "9400"]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.period_ms, 500);
        assert_eq!(config.port, 9400);
    }

    #[test]
    fn zero_period_flag_rejected() {
        let cli = Cli::parse_from(["inframindd", "--period-ms", "0"]);
        assert!(cli.resolve_config().is_err());
    }

    #[test]
    fn cache_collector_needs_stats_file() {
        let defaults = CollectorsConfig::default();
        assert!(!daemon_collectors(&defaults).cache);
        assert!(daemon_collectors(&defaults).cpu);

        let with_file = CollectorsConfig {
            cache_stats_file: Some(PathBuf::from("/var/cache/ccache/stats")),
            ..CollectorsConfig::default()
        };
        assert!(daemon_collectors(&with_file).cache);

        let names: Vec<String> = build_collectors(&daemon_collectors(&defaults), CacheStats::new())
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["cpu", "memory", "io"]);
    }

    #[test]
    fn bad_log_level_rejected_by_parser() {
        assert!(Cli::try_parse_from(["inframindd", "--log-level", "trace"]).is_err());
    }
}
