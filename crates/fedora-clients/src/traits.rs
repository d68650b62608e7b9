//! Collaborator trait definitions
//!
//! The scanner only ever talks to the outside world through these:
//! - `WebFetch`: plain HTTP reads (monitor page, result index, logs, PDC)
//! - `RetirementChecker`: "is this package blocked in the target tag?"
//! - `BugTracker`: bugs blocking the tracking issue
//! - `BugViewer`: opens a pre-filled bug form for the operator
//!
//! Real implementations live in the sibling modules; in-memory fakes are
//! provided for testing via the `fakes` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ClientResult, RetirementError};

// ---------------------------------------------------------------------------
// WebFetch
// ---------------------------------------------------------------------------

/// Read-only HTTP access.
#[async_trait]
pub trait WebFetch: Send + Sync {
    /// GET a page or log as text. Gzip bodies are decompressed.
    async fn get_text(&self, url: &str) -> ClientResult<String>;

    /// GET and parse a JSON document.
    async fn get_json(&self, url: &str) -> ClientResult<serde_json::Value>;

    /// Byte length of a resource as reported by a HEAD request.
    async fn content_length(&self, url: &str) -> ClientResult<u64>;
}

// ---------------------------------------------------------------------------
// RetirementChecker
// ---------------------------------------------------------------------------

/// Answers whether a package is retired (blocked) in the target branch.
///
/// `Err` means no answer could be obtained at all; a package unknown to the
/// build system is simply `Ok(false)`.
#[async_trait]
pub trait RetirementChecker: Send + Sync {
    async fn is_retired(&self, package: &str) -> Result<bool, RetirementError>;
}

// ---------------------------------------------------------------------------
// BugTracker
// ---------------------------------------------------------------------------

/// A bug blocking the tracking issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bug {
    pub id: u64,
    /// Package (component) the bug is filed against
    pub component: String,
    /// Bugzilla status, e.g. `NEW`, `ASSIGNED`, `CLOSED`
    pub status: String,
    /// Resolution, empty while the bug is open
    #[serde(default)]
    pub resolution: String,
}

impl Bug {
    pub fn is_closed(&self) -> bool {
        self.status == "CLOSED"
    }
}

/// Source of the bugs blocking a tracking issue.
#[async_trait]
pub trait BugTracker: Send + Sync {
    /// All non-duplicate bugs blocking `tracker`, newest (highest id) first.
    async fn blocking_bugs(&self, tracker: u64) -> ClientResult<Vec<Bug>>;
}

/// First bug filed against `package`, by linear scan.
pub fn find_bug<'a>(bugs: &'a [Bug], package: &str) -> Option<&'a Bug> {
    bugs.iter().find(|b| b.component == package)
}

// ---------------------------------------------------------------------------
// BugViewer
// ---------------------------------------------------------------------------

/// Presents a pre-filled bug submission form to the operator.
#[async_trait]
pub trait BugViewer: Send + Sync {
    async fn open(&self, url: &str) -> ClientResult<()>;
}
