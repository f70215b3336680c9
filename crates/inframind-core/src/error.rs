//! Error types for collectors, exporters, and configuration.
//!
//! None of these are fatal to a running agent. Collector and exporter
//! errors are logged with the component name and the cycle moves on.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// A collector could not produce a sample this cycle.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("{0}")]
    Other(String),
}

impl CollectorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CollectorError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CollectorError::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// An exporter could not start or consume a snapshot.
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
