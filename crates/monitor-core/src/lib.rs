//! Monitor-Core: triage of failed builds in a Copr mass-rebuild project
//!
//! A run fetches the Copr monitor dashboard, classifies every failed package
//! into a triage color, prints one line per package as soon as it is known,
//! and can open pre-filled Bugzilla forms for packages that most likely fail
//! to build from source.
//!
//! ## Modules
//!
//! - [`page`]: dashboard parsing
//! - [`classify`]: precedence rules turning evidence into a color
//! - [`signals`]: failure signatures read from build logs
//! - [`filing`]: bug drafts and the filing guards
//! - [`scanner`]: the concurrent run itself
//! - [`gates`], [`report`]: shared admission limits and output

pub mod classify;
pub mod config;
pub mod error;
pub mod filing;
pub mod gates;
pub mod page;
pub mod report;
pub mod scanner;
pub mod signals;
pub mod telemetry;

pub use classify::{classify, Classification, Evidence, TriageColor};
pub use config::{ExclusionTable, LimitTable, MonitorConfig, ReasonSpec, ReasonTable};
pub use error::{ConfigError, MonitorError, MonitorResult};
pub use filing::{BugDraft, BugFiler, FilingOutcome};
pub use gates::Gates;
pub use page::{parse_monitor_page, BuildRecord, BuildStatus, MonitorPatterns, ParseError};
pub use report::{colors_enabled, DumpFile, Reporter};
pub use scanner::{Collaborators, PackageOutcome, ScanOptions, ScanReport, Scanner};
pub use signals::LogSignals;
pub use telemetry::{init_tracing, level_for};
