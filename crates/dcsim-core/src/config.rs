//! Configuration types for dcsim

use crate::DcsimError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Main worker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Polling behaviour
    pub worker: PollConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl WorkerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, DcsimError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DcsimError::Config(format!("Failed to read config file: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| DcsimError::Config(format!("Failed to parse config: {}", e)))
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL of the experiment store
    pub url: String,
    /// Maximum pooled connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://dcsim.db?mode=rwc".to_string(),
            max_connections: 4,
        }
    }
}

/// Queue polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Sleep between polls of an empty backlog, in milliseconds
    pub poll_interval_ms: u64,
    /// Exit once the backlog is empty instead of waiting for more work
    pub drain: bool,
    /// Stop after this many experiments (0 = unlimited)
    pub max_experiments: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            drain: false,
            max_experiments: 0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Scheduling strategy stored on an experiment definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchedulerKind {
    /// Oldest eligible workload first
    Fifo,
    /// Shortest remaining work first
    Srtf,
    /// Seeded shuffle of the eligible workloads
    Random,
}

impl FromStr for SchedulerKind {
    type Err = DcsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FIFO" => Ok(SchedulerKind::Fifo),
            "SRTF" => Ok(SchedulerKind::Srtf),
            "RANDOM" => Ok(SchedulerKind::Random),
            _ => Err(DcsimError::UnknownScheduler(s.to_string())),
        }
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerKind::Fifo => write!(f, "FIFO"),
            SchedulerKind::Srtf => write!(f, "SRTF"),
            SchedulerKind::Random => write!(f, "RANDOM"),
        }
    }
}
