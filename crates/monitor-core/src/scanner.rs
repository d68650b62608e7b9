//! One monitor run: fetch, parse, classify every failed package concurrently
//! and optionally propose bug reports.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fedora_clients::pdc::critical_path;
use fedora_clients::{
    find_bug, Bug, BugTracker, BugViewer, BuildLog, CoprProject, Pdc, RetirementChecker, WebFetch,
};
use futures::future::try_join;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::classify::{classify, Classification, Evidence, TriageColor};
use crate::config::{MonitorConfig, ReasonTable};
use crate::error::{ConfigError, MonitorError, MonitorResult};
use crate::filing::{BugFiler, FilingOutcome};
use crate::gates::Gates;
use crate::page::{parse_monitor_page, BuildRecord, BuildStatus, MonitorPatterns};
use crate::report::{DumpFile, Reporter};
use crate::signals::LogSignals;

/// The external services a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub web: Arc<dyn WebFetch>,
    pub retirement: Arc<dyn RetirementChecker>,
    pub bugs: Arc<dyn BugTracker>,
    pub viewer: Arc<dyn BugViewer>,
}

/// Per-run switches, usually straight from the command line.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Only classify these packages; empty means all
    pub packages: Vec<String>,
    pub open_bug_reports: bool,
    pub require_reason: bool,
    pub blues_file: Option<PathBuf>,
    pub magentas_file: Option<PathBuf>,
    pub failed_but_built_file: Option<PathBuf>,
}

/// Verdict and filing result of one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOutcome {
    pub classification: Classification,
    pub filing: Option<FilingOutcome>,
}

/// Everything a finished run produced, in completion order.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub outcomes: Vec<PackageOutcome>,
}

impl ScanReport {
    pub fn classification(&self, package: &str) -> Option<&Classification> {
        self.outcomes
            .iter()
            .map(|o| &o.classification)
            .find(|c| c.package == package)
    }

    pub fn filing(&self, package: &str) -> Option<&FilingOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.classification.package == package)
            .and_then(|o| o.filing.as_ref())
    }

    pub fn count(&self, color: TriageColor) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.classification.color == color)
            .count()
    }
}

pub struct Scanner {
    config: MonitorConfig,
    reasons: ReasonTable,
    collaborators: Collaborators,
    gates: Arc<Gates>,
    reporter: Arc<Reporter>,
}

/// Shared, read-only state of the classification tasks.
struct ScanContext {
    project: CoprProject,
    pdc: Pdc,
    config: MonitorConfig,
    web: Arc<dyn WebFetch>,
    retirement: Arc<dyn RetirementChecker>,
    gates: Arc<Gates>,
    reporter: Arc<Reporter>,
    bugs: Vec<Bug>,
    blues: Option<DumpFile>,
    magentas: Option<DumpFile>,
    filer: Option<BugFiler>,
}

impl Scanner {
    pub fn new(
        config: MonitorConfig,
        collaborators: Collaborators,
        reporter: Arc<Reporter>,
    ) -> MonitorResult<Self> {
        config.validate()?;
        let reasons = config.reason_table()?;
        let gates = Arc::new(Gates::new(&config.concurrency));
        Ok(Scanner {
            config,
            reasons,
            collaborators,
            gates,
            reporter,
        })
    }

    #[instrument(skip_all, fields(project = %self.config.project.name))]
    pub async fn run(&self, options: &ScanOptions) -> MonitorResult<ScanReport> {
        let project = self.config.project.copr();
        let patterns =
            MonitorPatterns::for_project(&project).map_err(|e| ConfigError::Invalid {
                field: "project".to_string(),
                reason: e.to_string(),
            })?;

        let blues = open_dump(options.blues_file.as_deref(), DumpFile::create)?;
        let magentas = open_dump(options.magentas_file.as_deref(), DumpFile::create)?;
        let failed_but_built =
            open_dump(options.failed_but_built_file.as_deref(), DumpFile::append)?.map(Arc::new);

        let monitor_url = project.monitor_url();
        info!(
            url = %monitor_url,
            tracker = self.config.tracker,
            "fetching monitor page and tracker bugs"
        );
        let page = async {
            self.gates
                .http(self.collaborators.web.get_text(&monitor_url))
                .await
                .map_err(|source| MonitorError::MonitorPage {
                    url: monitor_url.clone(),
                    source,
                })
        };
        let bugs = async {
            self.gates
                .http(self.collaborators.bugs.blocking_bugs(self.config.tracker))
                .await
                .map_err(MonitorError::Tracker)
        };
        let (html, bugs) = try_join(page, bugs).await?;

        let records = parse_monitor_page(&html, &patterns)?;
        let failed: Vec<BuildRecord> = records
            .into_iter()
            .filter(|r| r.status == BuildStatus::Failed)
            .filter(|r| options.packages.is_empty() || options.packages.contains(&r.package))
            .collect();
        info!(failed = failed.len(), bugs = bugs.len(), "classifying failed packages");

        let filer = options.open_bug_reports.then(|| {
            let bugzilla = self.config.bugzilla.client_config();
            BugFiler {
                project: project.clone(),
                web: Arc::clone(&self.collaborators.web),
                viewer: Arc::clone(&self.collaborators.viewer),
                gates: Arc::clone(&self.gates),
                reasons: self.reasons.clone(),
                require_reason: options.require_reason,
                tracker: self.config.tracker,
                interpreter: self.config.interpreter.clone(),
                product: bugzilla.product.clone(),
                enter_bug_base: bugzilla.enter_bug_url(),
                failed_but_built,
            }
        });

        let ctx = Arc::new(ScanContext {
            project,
            pdc: self.config.pdc.client(),
            config: self.config.clone(),
            web: Arc::clone(&self.collaborators.web),
            retirement: Arc::clone(&self.collaborators.retirement),
            gates: Arc::clone(&self.gates),
            reporter: Arc::clone(&self.reporter),
            bugs,
            blues,
            magentas,
            filer,
        });

        let mut tasks = JoinSet::new();
        for record in failed {
            tasks.spawn(classify_package(Arc::clone(&ctx), record));
        }

        let mut report = ScanReport::default();
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(|e| MonitorError::Task(e.to_string()))
                .and_then(|result| result);
            match outcome {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => {
                    warn!(error = %e, "aborting remaining classifications");
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    return Err(e);
                }
            }
        }

        Ok(report)
    }
}

fn open_dump(
    path: Option<&Path>,
    open: fn(&Path) -> io::Result<DumpFile>,
) -> MonitorResult<Option<DumpFile>> {
    Ok(path.map(open).transpose()?)
}

#[instrument(skip_all, fields(package = %record.package, build = record.build_id))]
async fn classify_package(
    ctx: Arc<ScanContext>,
    record: BuildRecord,
) -> MonitorResult<PackageOutcome> {
    let package = record.package.as_str();

    let retired = ctx
        .gates
        .command(ctx.retirement.is_retired(package))
        .await
        .map_err(|source| MonitorError::Retirement {
            package: package.to_string(),
            source,
        })?;
    if retired {
        let classification = classify(
            package,
            &Evidence {
                retired: true,
                ..Evidence::default()
            },
        );
        ctx.reporter.record(&classification)?;
        return Ok(PackageOutcome {
            classification,
            filing: None,
        });
    }

    let (log_length, critical_path) = tokio::join!(
        ctx.log_length(package, record.build_id),
        ctx.critical_path(package)
    );
    let mut evidence = Evidence {
        retired: false,
        log_length,
        critical_path,
        exclusion: ctx.config.exclusions.reason(package),
        bug: find_bug(&ctx.bugs, package),
        signals: None,
        limit: ctx.config.limits.limit_for(package),
    };

    let live_log = if evidence.needs_log() {
        ctx.live_log(package, record.build_id).await
    } else {
        None
    };
    evidence.signals = live_log.as_deref().map(LogSignals::scan);

    let classification = classify(package, &evidence);
    ctx.reporter.record(&classification)?;

    let dump = match classification.color {
        TriageColor::Blue => ctx.blues.as_ref(),
        TriageColor::Magenta => ctx.magentas.as_ref(),
        _ => None,
    };
    if let Some(dump) = dump {
        dump.write_line(package)?;
    }

    let filing = match (&ctx.filer, classification.color) {
        (Some(filer), TriageColor::Red) => {
            Some(filer.file(package, record.build_id, live_log.as_deref()).await)
        }
        _ => None,
    };

    Ok(PackageOutcome {
        classification,
        filing,
    })
}

impl ScanContext {
    async fn log_length(&self, package: &str, build_id: u64) -> Option<u64> {
        let url = self.project.log_url(package, build_id, BuildLog::Build);
        match self.gates.http(self.web.content_length(&url)).await {
            Ok(length) => Some(length),
            Err(e) => {
                debug!(url = %url, error = %e, "build log length unknown");
                None
            }
        }
    }

    async fn critical_path(&self, package: &str) -> bool {
        let url = self.pdc.critpath_url(package);
        let answer = self
            .gates
            .http(self.web.get_json(&url))
            .await
            .and_then(|json| critical_path(&json));
        match answer {
            Ok(flag) => flag,
            Err(e) => {
                debug!(url = %url, error = %e, "could not check critical path");
                false
            }
        }
    }

    async fn live_log(&self, package: &str, build_id: u64) -> Option<String> {
        let url = self.project.log_url(package, build_id, BuildLog::Live);
        match self.gates.http(self.web.get_text(&url)).await {
            Ok(text) => Some(text),
            Err(e) => {
                debug!(url = %url, error = %e, "live build log unavailable");
                None
            }
        }
    }
}
