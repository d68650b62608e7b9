//! Error taxonomy of a monitor run.
//!
//! Everything here aborts the run. Per-package degradations (a missing log,
//! an odd PDC answer) never become a `MonitorError`; they are logged and
//! replaced by a conservative default where they happen.

use fedora_clients::{ClientError, RetirementError};

use crate::page::ParseError;

/// Errors produced while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid failure-reason pattern {name:?}: {source}")]
    ReasonPattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// Fatal monitor errors.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("monitor page format changed: {0}")]
    Parse(#[from] ParseError),

    #[error("retirement check failed for {package}: {source}")]
    Retirement {
        package: String,
        #[source]
        source: RetirementError,
    },

    #[error("cannot fetch monitor page {url}: {source}")]
    MonitorPage {
        url: String,
        #[source]
        source: ClientError,
    },

    #[error("cannot load tracker bugs: {0}")]
    Tracker(#[source] ClientError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("classification task failed: {0}")]
    Task(String),
}

/// Result type for monitor operations.
pub type MonitorResult<T> = std::result::Result<T, MonitorError>;
