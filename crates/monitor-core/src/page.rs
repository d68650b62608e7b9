//! Monitor dashboard parsing.
//!
//! Every table row of the Copr monitor contains, on separate lines, a link to
//! the package, a link to its latest build and a status span. The parser
//! walks the page line by line and insists on that exact order, so a format
//! change is reported instead of silently pairing a build with the wrong
//! package.

use std::fmt;

use fedora_clients::copr::decode_package_name;
use fedora_clients::CoprProject;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Line after which the page carries no more build rows
pub const TRAILER_MARKER: &str = "Possible build states:";

/// Copr build state, taken from the `build-<state>` CSS class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Succeeded,
    Failed,
    Running,
    Pending,
    Importing,
    Forked,
    Skipped,
    Starting,
    Canceled,
    Waiting,
    Other(String),
}

impl BuildStatus {
    pub fn from_css(s: &str) -> Self {
        match s {
            "succeeded" => BuildStatus::Succeeded,
            "failed" => BuildStatus::Failed,
            "running" => BuildStatus::Running,
            "pending" => BuildStatus::Pending,
            "importing" => BuildStatus::Importing,
            "forked" => BuildStatus::Forked,
            "skipped" => BuildStatus::Skipped,
            "starting" => BuildStatus::Starting,
            "canceled" => BuildStatus::Canceled,
            "waiting" => BuildStatus::Waiting,
            other => BuildStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStatus::Succeeded => "succeeded",
            BuildStatus::Failed => "failed",
            BuildStatus::Running => "running",
            BuildStatus::Pending => "pending",
            BuildStatus::Importing => "importing",
            BuildStatus::Forked => "forked",
            BuildStatus::Skipped => "skipped",
            BuildStatus::Starting => "starting",
            BuildStatus::Canceled => "canceled",
            BuildStatus::Waiting => "waiting",
            BuildStatus::Other(s) => s,
        };
        f.write_str(s)
    }
}

/// One row of the monitor dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub package: String,
    pub build_id: u64,
    pub status: BuildStatus,
}

/// Errors raised when the page does not follow the package → build → status
/// rhythm.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: found a {found} match while awaiting a {expected} match")]
    OutOfSequence {
        line: usize,
        found: &'static str,
        expected: &'static str,
    },

    #[error("line {line}: build id {raw:?} is not a number")]
    InvalidBuildId { line: usize, raw: String },
}

/// The three per-row patterns of one project's dashboard.
#[derive(Debug, Clone)]
pub struct MonitorPatterns {
    package: Regex,
    build: Regex,
    status: Regex,
}

impl MonitorPatterns {
    pub fn for_project(project: &CoprProject) -> Result<Self, regex::Error> {
        let path = regex::escape(&project.frontend_path());
        Ok(MonitorPatterns {
            package: Regex::new(&format!(r#"<a href="/coprs/{path}/package/([^/]+)/">"#))?,
            build: Regex::new(&format!(r#"<a href="/coprs/{path}/build/([^/]+)/">"#))?,
            status: Regex::new(r#"<span class="build-([^"]+)""#)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    AwaitingPackage,
    AwaitingBuild,
    AwaitingStatus,
}

impl ParserState {
    fn expected(&self) -> &'static str {
        match self {
            ParserState::AwaitingPackage => "package",
            ParserState::AwaitingBuild => "build",
            ParserState::AwaitingStatus => "status",
        }
    }
}

/// Parse the monitor dashboard into build records, in dashboard order.
pub fn parse_monitor_page(
    html: &str,
    patterns: &MonitorPatterns,
) -> Result<Vec<BuildRecord>, ParseError> {
    let mut state = ParserState::AwaitingPackage;
    let mut package = String::new();
    let mut build_id = 0u64;
    let mut records = Vec::new();

    for (idx, line) in html.lines().enumerate() {
        let line_no = idx + 1;
        let out_of_sequence =
            |found: &'static str, state: ParserState| ParseError::OutOfSequence {
                line: line_no,
                found,
                expected: state.expected(),
            };

        if let Some(hit) = patterns.package.captures(line) {
            if state != ParserState::AwaitingPackage {
                return Err(out_of_sequence("package", state));
            }
            package = decode_package_name(&hit[1]);
            state = ParserState::AwaitingBuild;
        }

        if let Some(hit) = patterns.build.captures(line) {
            if state != ParserState::AwaitingBuild {
                return Err(out_of_sequence("build", state));
            }
            build_id = hit[1].parse().map_err(|_| ParseError::InvalidBuildId {
                line: line_no,
                raw: hit[1].to_string(),
            })?;
            state = ParserState::AwaitingStatus;
        }

        if let Some(hit) = patterns.status.captures(line) {
            if state != ParserState::AwaitingStatus {
                return Err(out_of_sequence("status", state));
            }
            records.push(BuildRecord {
                package: std::mem::take(&mut package),
                build_id,
                status: BuildStatus::from_css(&hit[1]),
            });
            state = ParserState::AwaitingPackage;
        }

        if line.contains(TRAILER_MARKER) {
            break;
        }
    }

    if state != ParserState::AwaitingPackage {
        debug!(package = %package, "dropping incomplete trailing row");
    }

    Ok(records)
}
