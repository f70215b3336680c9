//! Agent configuration (`inframind.toml`).

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Verbosity of the structured metrics log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(ConfigError::Invalid(format!(
                "unknown log level {other:?}, expected \"info\" or \"debug\""
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Cycle cadence in milliseconds.
    pub period_ms: u64,
    /// Listen port for the metrics endpoint.
    pub port: u16,
    pub bind_address: IpAddr,
    pub log_level: LogLevel,
    pub collectors: CollectorsConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            period_ms: 1000,
            port: 9102,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            log_level: LogLevel::Info,
            collectors: CollectorsConfig::default(),
        }
    }
}

/// Which built-in collectors to register, and where procfs lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorsConfig {
    pub proc_root: PathBuf,
    pub cpu: bool,
    pub memory: bool,
    pub io: bool,
    pub cache: bool,
    /// `ccache --print-stats` dump re-read each cycle by the cache collector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_stats_file: Option<PathBuf>,
}

impl Default for CollectorsConfig {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            cpu: true,
            memory: true,
            io: true,
            cache: true,
            cache_stats_file: None,
        }
    }
}

impl AgentConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ms == 0 {
            return Err(ConfigError::Invalid("period_ms must be greater than 0".into()));
        }
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.period(), Duration::from_secs(1));
        assert_eq!(config.listen_addr(), "0.0.0.0:9102".parse::<SocketAddr>().unwrap());
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.collectors.cpu && config.collectors.cache);
    }

    #[test]
    fn parse_empty_uses_defaults() {
        let config = AgentConfig::from_toml_str("").unwrap();
        assert_eq!(config, AgentConfig::default());
    }

    #[test]
    fn parse_full() {
        let toml_str = r#"
period_ms = 250
port = 9200
bind_address = "127.0.0.1"
log_level = "debug"

[collectors]
proc_root = "/host/proc"
cache = false
cache_stats_file = "/var/cache/ccache/stats"
"#;
        let config = AgentConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.period_ms, 250);
        assert_eq!(config.listen_addr(), "127.0.0.1:9200".parse::<SocketAddr>().unwrap());
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.collectors.proc_root, PathBuf::from("/host/proc"));
        assert!(config.collectors.cpu);
        assert!(!config.collectors.cache);
        assert_eq!(
            config.collectors.cache_stats_file,
            Some(PathBuf::from("/var/cache/ccache/stats"))
        );
    }

    #[test]
    fn zero_period_rejected() {
        let err = AgentConfig::from_toml_str("period_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_log_level_rejected() {
        let err = AgentConfig::from_toml_str("log_level = \"trace\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn log_level_from_str() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!(" info ".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 9999").unwrap();

        let config = AgentConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 9999);
        assert_eq!(config.period_ms, 1000);
    }

    #[test]
    fn from_missing_file() {
        let err = AgentConfig::from_file(Path::new("/nonexistent/inframind.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
