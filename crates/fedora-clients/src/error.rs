//! Error types for fedora-clients

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to Copr, PDC, Bugzilla or a viewer
#[derive(Error, Debug)]
pub enum ClientError {
    /// Resource does not exist (HTTP 404)
    #[error("not found: {0}")]
    NotFound(String),

    /// Non-success HTTP status other than 404
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Server closed the connection before answering
    #[error("server disconnected while fetching {0}")]
    Disconnected(String),

    /// HEAD response carried no usable Content-Length
    #[error("no content length for {0}")]
    MissingLength(String),

    /// Body could not be decompressed or decoded
    #[error("undecodable body for {url}: {reason}")]
    Decode { url: String, reason: String },

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload parsed but did not have the expected shape
    #[error("unexpected payload from {source_name}: {reason}")]
    UnexpectedShape { source_name: String, reason: String },

    /// Viewer command could not be started
    #[error("failed to launch viewer {program}: {reason}")]
    Viewer { program: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        if err.is_connect() || err.is_body() || (err.is_request() && !err.is_timeout()) {
            ClientError::Disconnected(url)
        } else if err.is_decode() {
            ClientError::Decode {
                url,
                reason: err.to_string(),
            }
        } else {
            ClientError::Http(err.to_string())
        }
    }
}

impl ClientError {
    /// Whether a single retry after a short backoff is worthwhile.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Disconnected(_))
    }
}

/// Errors of the retirement check.
///
/// Both variants mean the command could not give an answer at all, which the
/// scanner treats as fatal for the whole run.
#[derive(Error, Debug)]
pub enum RetirementError {
    /// The command could not be spawned
    #[error("failed to run {program}: {reason}")]
    Unavailable { program: String, reason: String },

    /// The command did not finish in time
    #[error("{program} did not finish within {}s", .limit.as_secs())]
    TimedOut { program: String, limit: Duration },
}

/// Result type for client operations
pub type ClientResult<T> = std::result::Result<T, ClientError>;
