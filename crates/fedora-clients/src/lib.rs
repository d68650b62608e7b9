//! Fedora-Clients: the external collaborators of the FTBFS monitor
//!
//! This crate wraps every service the monitor talks to behind a narrow
//! trait so the scanner can be exercised against fakes:
//!
//! - Copr: monitor dashboard, result directories and build logs (HTTP)
//! - PDC: critical-path flag of a component (HTTP, JSON)
//! - Koji: retirement check (`koji list-pkgs`, subprocess)
//! - Bugzilla: bugs blocking a tracking issue (REST)
//! - Viewer: opening a pre-filled bug form (subprocess)

pub mod bugzilla;
pub mod copr;
pub mod error;
pub mod fakes;
pub mod http;
pub mod koji;
pub mod pdc;
pub mod traits;
pub mod viewer;

pub use bugzilla::{BugzillaClient, BugzillaConfig};
pub use copr::{BuildLog, CoprProject};
pub use error::{ClientError, ClientResult, RetirementError};
pub use http::{HttpClient, HttpConfig};
pub use koji::KojiCli;
pub use pdc::Pdc;
pub use traits::{find_bug, Bug, BugTracker, BugViewer, RetirementChecker, WebFetch};
pub use viewer::CommandViewer;
