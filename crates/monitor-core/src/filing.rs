//! Pre-filled bug reports for red packages.
//!
//! Nothing is submitted: a Bugzilla `enter_bug.cgi` form is opened for a
//! human to review. Filing is skipped when the build actually produced RPMs,
//! or when a known failure reason is required and none was found.

use std::sync::Arc;

use fedora_clients::copr::produced_file_count;
use fedora_clients::{BugViewer, BuildLog, CoprProject, WebFetch};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::config::ReasonTable;
use crate::gates::Gates;
use crate::report::DumpFile;

pub const KOJI_PACKAGE_SEARCH: &str =
    "https://koji.fedoraproject.org/koji/search?match=glob&type=package&terms=";

/// Contents of a bug report about to be proposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BugDraft {
    pub summary: String,
    pub description: String,
    pub component: String,
    pub blocks: u64,
    pub product: String,
    pub version: String,
}

impl BugDraft {
    /// Form URL, `base` being the `enter_bug.cgi?` prefix.
    pub fn enter_bug_url(&self, base: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("short_desc", &self.summary)
            .append_pair("comment", &self.description)
            .append_pair("component", &self.component)
            .append_pair("blocked", &self.blocks.to_string())
            .append_pair("product", &self.product)
            .append_pair("version", &self.version)
            .finish();
        format!("{base}{query}")
    }
}

/// What happened to a red package when filing was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilingOutcome {
    Opened { url: String },
    /// The build produced RPMs even though it is marked failed
    FailedButBuilt { index_url: String },
    /// Reason required but none matched
    NoReason,
    /// The result directory could not be inspected
    IndexUnavailable,
    /// The viewer could not be started
    ViewerFailed,
}

pub struct BugFiler {
    pub project: CoprProject,
    pub web: Arc<dyn WebFetch>,
    pub viewer: Arc<dyn BugViewer>,
    pub gates: Arc<Gates>,
    pub reasons: ReasonTable,
    pub require_reason: bool,
    pub tracker: u64,
    pub interpreter: String,
    pub product: String,
    /// `enter_bug.cgi?` prefix of the Bugzilla instance
    pub enter_bug_base: String,
    pub failed_but_built: Option<Arc<DumpFile>>,
}

impl BugFiler {
    /// Propose a bug report for a red package.
    ///
    /// `live_log` is the live build log if the caller already has it.
    pub async fn file(
        &self,
        package: &str,
        build_id: u64,
        live_log: Option<&str>,
    ) -> FilingOutcome {
        let index_url = self.project.result_dir_url(package, build_id);
        let index = match self.gates.http(self.web.get_text(&index_url)).await {
            Ok(html) => html,
            Err(e) => {
                debug!(package, url = %index_url, error = %e, "cannot read result directory");
                return FilingOutcome::IndexUnavailable;
            }
        };

        if produced_file_count(&index) > 1 {
            info!(package, url = %index_url, "build is marked failed but produced RPMs");
            if let Some(dump) = &self.failed_but_built {
                if let Err(e) = dump.write_line(&index_url) {
                    warn!(path = %dump.path().display(), error = %e, "cannot write dump file");
                }
            }
            return FilingOutcome::FailedButBuilt { index_url };
        }

        let reason = live_log.and_then(|log| self.reasons.first_match(log));
        if reason.is_none() && self.require_reason {
            debug!(package, "no known failure reason, not filing");
            return FilingOutcome::NoReason;
        }

        let draft = self.draft(package, build_id, reason);
        let url = draft.enter_bug_url(&self.enter_bug_base);
        match self.gates.viewer(self.viewer.open(&url)).await {
            Ok(()) => FilingOutcome::Opened { url },
            Err(e) => {
                warn!(package, error = %e, "cannot open bug form");
                FilingOutcome::ViewerFailed
            }
        }
    }

    pub fn draft(&self, package: &str, build_id: u64, reason: Option<&str>) -> BugDraft {
        let summary = match reason {
            Some(reason) => format!(
                "{package} fails to build with {}: {reason}",
                self.interpreter
            ),
            None => format!("{package} fails to build with {}", self.interpreter),
        };

        let mut description = format!(
            "{package} fails to build with {interpreter} in the {copr} Copr.\n\n\
             Build: {build}\n\
             Build log: {log}\n\
             Koji builds: {KOJI_PACKAGE_SEARCH}{package}\n",
            interpreter = self.interpreter,
            copr = self.project.frontend_path(),
            build = self.project.build_url(build_id),
            log = self.project.log_url(package, build_id, BuildLog::Build),
        );
        if let Some(reason) = reason {
            description.push_str(&format!("\nThe failure looks like: {reason}\n"));
        }
        description.push_str(&format!(
            "\nThis issue blocks the {} rebuild. If the package won't build, \
             it won't be installable, along with all its dependent packages.\n\n\
             Let us know here if you have any questions. Thank You!\n",
            self.interpreter
        ));

        BugDraft {
            summary,
            description,
            component: package.to_string(),
            blocks: self.tracker,
            product: self.product.clone(),
            version: "rawhide".to_string(),
        }
    }
}
