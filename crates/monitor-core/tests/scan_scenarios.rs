//! End-to-end monitor runs against in-memory Copr, Koji, PDC and Bugzilla.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use fedora_clients::copr::RPM_FILE_ROW;
use fedora_clients::fakes::{FakeBugTracker, FakeRetirement, FakeWeb, RecordingViewer};
use fedora_clients::{BuildLog, CoprProject};
use monitor_core::{
    Collaborators, ExclusionTable, FilingOutcome, MonitorConfig, MonitorError, MonitorResult,
    Reporter, ScanOptions, ScanReport, Scanner, TriageColor,
};

const MONITOR: &str = "https://copr.fedorainfracloud.org/coprs/g/python/python3.8/monitor/";

struct Harness {
    config: MonitorConfig,
    web: Arc<FakeWeb>,
    koji: Arc<FakeRetirement>,
    bugs: Arc<FakeBugTracker>,
    viewer: Arc<RecordingViewer>,
}

fn project() -> CoprProject {
    MonitorConfig::default().project.copr()
}

fn row(package: &str, build: u64, status: &str) -> String {
    format!(
        "<tr>\n\
         <td><a href=\"/coprs/g/python/python3.8/package/{package}/\">{package}</a></td>\n\
         <td><a href=\"/coprs/g/python/python3.8/build/{build}/\">{build}</a></td>\n\
         <td><span class=\"build-{status}\">{status}</span></td>\n\
         </tr>\n"
    )
}

fn monitor_page(rows: &[(&str, u64, &str)]) -> String {
    let body: String = rows.iter().map(|(p, b, s)| row(p, *b, s)).collect();
    format!("<table>\n{body}</table>\n<p>Possible build states:</p>\n")
}

impl Harness {
    fn new(koji: FakeRetirement, bugs: FakeBugTracker) -> Self {
        let mut config = MonitorConfig::default();
        config.concurrency.viewer_cooldown_ms = 0;
        Harness {
            config,
            web: Arc::new(FakeWeb::new()),
            koji: Arc::new(koji),
            bugs: Arc::new(bugs),
            viewer: Arc::new(RecordingViewer::new()),
        }
    }

    fn with_web(mut self, web: FakeWeb) -> Self {
        self.web = Arc::new(web);
        self
    }

    fn monitor(&self, rows: &[(&str, u64, &str)]) {
        self.web.page(MONITOR, &monitor_page(rows));
    }

    /// Serve the build log length, the live log and a one-SRPM index page.
    fn failed(&self, package: &str, build: u64, length: u64, live_log: &str) {
        let project = project();
        self.web
            .length(&project.log_url(package, build, BuildLog::Build), length);
        self.web
            .page(&project.log_url(package, build, BuildLog::Live), live_log);
        self.web.page(
            &project.result_dir_url(package, build),
            &format!("<table><tr>{RPM_FILE_ROW}</tr></table>"),
        );
    }

    fn critical_path(&self, package: &str) {
        let url = self.config.pdc.client().critpath_url(package);
        let body = serde_json::json!({
            "count": 1,
            "results": [{"type": "rpm", "critical_path": true}]
        });
        self.web.page(&url, &body.to_string());
    }

    async fn run(&self, options: &ScanOptions) -> MonitorResult<ScanReport> {
        let collaborators = Collaborators {
            web: self.web.clone(),
            retirement: self.koji.clone(),
            bugs: self.bugs.clone(),
            viewer: self.viewer.clone(),
        };
        let reporter = Arc::new(Reporter::new(Box::new(io::sink()), false));
        let scanner = Scanner::new(self.config.clone(), collaborators, reporter)?;
        scanner.run(options).await
    }
}

fn filing_enabled() -> ScanOptions {
    ScanOptions {
        open_bug_reports: true,
        ..ScanOptions::default()
    }
}

// ---- Classification scenarios ----

#[tokio::test]
async fn retired_package_is_green_without_further_calls() {
    let h = Harness::new(FakeRetirement::new().retired("foo"), FakeBugTracker::default());
    h.monitor(&[("foo", 42, "failed")]);

    let report = h.run(&filing_enabled()).await.unwrap();
    let c = report.classification("foo").unwrap();
    assert_eq!(c.color, TriageColor::Green);
    assert_eq!(c.message, "foo is retired");
    assert_eq!(h.web.requests(), vec![MONITOR.to_string()]);
    assert!(h.viewer.urls().is_empty());
}

#[tokio::test]
async fn long_log_without_bug_is_red_and_filed() {
    let h = Harness::new(FakeRetirement::new(), FakeBugTracker::default());
    h.monitor(&[("bar", 43, "failed")]);
    h.failed("bar", 43, 2000, "gcc: error: unrecognized option");

    let report = h.run(&filing_enabled()).await.unwrap();
    let c = report.classification("bar").unwrap();
    assert_eq!(c.color, TriageColor::Red);
    assert_eq!(c.message, "bar failed len=2000");

    assert!(matches!(report.filing("bar"), Some(FilingOutcome::Opened { .. })));
    let urls = h.viewer.urls();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].starts_with("https://bugzilla.redhat.com/enter_bug.cgi?"));
    assert!(urls[0].contains("component=bar"));
    assert!(urls[0].contains("blocked=1686977"));
}

#[tokio::test]
async fn excluded_package_is_cyan_and_never_filed() {
    let mut h = Harness::new(FakeRetirement::new(), FakeBugTracker::default());
    h.config.exclusions = ExclusionTable::new([("baz".to_string(), "flaky".to_string())]);
    h.monitor(&[("baz", 44, "failed")]);
    h.failed("baz", 44, 5000, "Failed to download metadata for repo\n".repeat(5).as_str());

    let report = h.run(&filing_enabled()).await.unwrap();
    let c = report.classification("baz").unwrap();
    assert_eq!(c.color, TriageColor::Cyan);
    assert_eq!(c.message, "baz failed len=5000 (excluded: flaky)");
    assert_eq!(report.filing("baz"), None);
    assert!(h.viewer.urls().is_empty());
    assert!(!h.web.requested("builder-live.log"));
}

#[tokio::test]
async fn open_bug_is_yellow() {
    let h = Harness::new(
        FakeRetirement::new(),
        FakeBugTracker::default()
            .with_bug(12, "qux", "CLOSED")
            .with_bug(999, "qux", "NEW"),
    );
    h.monitor(&[("qux", 45, "failed")]);
    h.failed("qux", 45, 3000, "");

    let report = h.run(&filing_enabled()).await.unwrap();
    let c = report.classification("qux").unwrap();
    assert_eq!(c.color, TriageColor::Yellow);
    assert_eq!(c.message, "qux failed len=3000 bz999 NEW");
    assert!(h.viewer.urls().is_empty());
    assert_eq!(h.bugs.queries(), 1);
}

#[tokio::test]
async fn closed_bug_short_log_on_critical_path() {
    let h = Harness::new(
        FakeRetirement::new(),
        FakeBugTracker::default().with_bug(123, "foo", "CLOSED"),
    );
    h.monitor(&[("foo", 46, "failed")]);
    h.failed("foo", 46, 500, "");
    h.critical_path("foo");

    let report = h.run(&ScanOptions::default()).await.unwrap();
    let c = report.classification("foo").unwrap();
    assert_eq!(c.color, TriageColor::Blue);
    assert_eq!(c.message, "foo failed len=500 bz123 CLOSED \u{1F525}");
}

#[tokio::test]
async fn unknown_length_is_not_substantial() {
    let h = Harness::new(FakeRetirement::new(), FakeBugTracker::default());
    h.monitor(&[("foo", 47, "failed")]);

    let report = h.run(&ScanOptions::default()).await.unwrap();
    let c = report.classification("foo").unwrap();
    assert_eq!(c.color, TriageColor::Blue);
    assert_eq!(c.message, "foo failed len=?");
}

#[tokio::test]
async fn only_failed_rows_are_classified() {
    let h = Harness::new(FakeRetirement::new(), FakeBugTracker::default());
    h.monitor(&[
        ("ok", 1, "succeeded"),
        ("busy", 2, "running"),
        ("bad", 3, "failed"),
    ]);
    h.failed("bad", 3, 10, "");

    let report = h.run(&ScanOptions::default()).await.unwrap();
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(h.koji.calls(), vec!["bad"]);
}

#[tokio::test]
async fn package_filter_limits_the_run() {
    let h = Harness::new(FakeRetirement::new(), FakeBugTracker::default());
    h.monitor(&[("foo", 1, "failed"), ("bar", 2, "failed")]);
    h.failed("foo", 1, 10, "");
    h.failed("bar", 2, 10, "");

    let options = ScanOptions {
        packages: vec!["bar".to_string()],
        ..ScanOptions::default()
    };
    let report = h.run(&options).await.unwrap();
    assert_eq!(report.outcomes.len(), 1);
    assert!(report.classification("bar").is_some());
    assert_eq!(h.koji.calls(), vec!["bar"]);
}

// ---- Log heuristics and dump files ----

#[tokio::test]
async fn dumps_collect_blue_and_magenta_packages() {
    let dir = tempfile::tempdir().unwrap();
    let blues = dir.path().join("blues.pkgs");
    let magentas = dir.path().join("magentas.pkgs");
    std::fs::write(&blues, "from-last-run\n").unwrap();

    let h = Harness::new(FakeRetirement::new(), FakeBugTracker::default());
    h.monitor(&[("deps", 1, "failed"), ("flake", 2, "failed"), ("slow", 3, "failed")]);
    h.failed("deps", 1, 9000, "No matching package to install: 'python3-nope'\n");
    h.failed(
        "flake",
        2,
        9000,
        &"Failed to download metadata for repo 'copr_base'\n".repeat(3),
    );
    h.failed("slow", 3, 100, "curl: (28) Operation timed out\n");

    let options = ScanOptions {
        blues_file: Some(blues.clone()),
        magentas_file: Some(magentas.clone()),
        ..ScanOptions::default()
    };
    let report = h.run(&options).await.unwrap();

    assert_eq!(
        report.classification("deps").unwrap().message,
        "deps failed len=9000 (unresolvable deps)"
    );
    assert_eq!(
        report.classification("flake").unwrap().message,
        "flake failed len=9000 (infra: repo metadata)"
    );
    assert_eq!(
        report.classification("slow").unwrap().message,
        "slow failed len=100 (infra: timeout)"
    );
    assert_eq!(report.count(TriageColor::Magenta), 2);

    assert_eq!(std::fs::read_to_string(&blues).unwrap(), "deps\n");
    let mut flaky: Vec<String> = std::fs::read_to_string(&magentas)
        .unwrap()
        .lines()
        .map(String::from)
        .collect();
    flaky.sort();
    assert_eq!(flaky, vec!["flake", "slow"]);
}

// ---- Bug filing ----

#[tokio::test]
async fn failed_but_built_is_recorded_instead_of_filed() {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("failed_but_built.lst");

    let h = Harness::new(FakeRetirement::new(), FakeBugTracker::default());
    h.monitor(&[("foo", 50, "failed")]);
    h.failed("foo", 50, 8000, "");
    let index = project().result_dir_url("foo", 50);
    h.web.page(&index, &format!("{RPM_FILE_ROW}\n{RPM_FILE_ROW}\n"));

    let options = ScanOptions {
        failed_but_built_file: Some(dump.clone()),
        ..filing_enabled()
    };
    let report = h.run(&options).await.unwrap();
    assert_eq!(report.classification("foo").unwrap().color, TriageColor::Red);
    assert_eq!(
        report.filing("foo"),
        Some(&FilingOutcome::FailedButBuilt {
            index_url: index.clone()
        })
    );
    assert!(h.viewer.urls().is_empty());
    assert_eq!(std::fs::read_to_string(&dump).unwrap(), format!("{index}\n"));
}

#[tokio::test]
async fn require_reason_files_only_recognised_failures() {
    let h = Harness::new(FakeRetirement::new(), FakeBugTracker::default());
    h.monitor(&[("known", 1, "failed"), ("unknown", 2, "failed")]);
    h.failed(
        "known",
        1,
        4000,
        "AttributeError: module 'time' has no attribute 'clock'\n",
    );
    h.failed("unknown", 2, 4000, "make: *** [all] Error 2\n");

    let options = ScanOptions {
        require_reason: true,
        ..filing_enabled()
    };
    let report = h.run(&options).await.unwrap();
    assert_eq!(report.filing("unknown"), Some(&FilingOutcome::NoReason));

    let urls = h.viewer.urls();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].contains("component=known"));
    assert!(urls[0].contains("time.clock"));
}

#[tokio::test(start_paused = true)]
async fn bug_forms_open_one_at_a_time_with_cooldown() {
    let mut h = Harness::new(FakeRetirement::new(), FakeBugTracker::default());
    h.config.concurrency.viewer_cooldown_ms = 1000;
    h.monitor(&[("a", 1, "failed"), ("b", 2, "failed"), ("c", 3, "failed")]);
    for (pkg, id) in [("a", 1), ("b", 2), ("c", 3)] {
        h.failed(pkg, id, 5000, "");
    }

    h.run(&filing_enabled()).await.unwrap();

    let mut times = h.viewer.times();
    assert_eq!(times.len(), 3);
    times.sort();
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(1));
    }
    assert_eq!(h.viewer.gauge().peak(), 1);
}

// ---- Concurrency and failure policy ----

#[tokio::test(start_paused = true)]
async fn gates_bound_peak_concurrency() {
    let mut h = Harness::new(
        FakeRetirement::new().with_delay(Duration::from_millis(20)),
        FakeBugTracker::default(),
    )
    .with_web(FakeWeb::new().with_delay(Duration::from_millis(10)));
    h.config.concurrency.http = 4;
    h.config.concurrency.commands = 2;

    let names: Vec<String> = (0..30).map(|i| format!("pkg{i}")).collect();
    let rows: Vec<(&str, u64, &str)> = names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i as u64 + 1, "failed"))
        .collect();
    h.monitor(&rows);
    for (name, id, _) in &rows {
        h.failed(name, *id, 100, "");
    }

    let report = h.run(&ScanOptions::default()).await.unwrap();
    assert_eq!(report.outcomes.len(), 30);
    assert!(h.web.gauge().peak() <= 4, "http peak {}", h.web.gauge().peak());
    assert!(h.koji.gauge().peak() <= 2, "koji peak {}", h.koji.gauge().peak());
    assert_eq!(h.koji.gauge().peak(), 2);
}

#[tokio::test]
async fn retirement_failure_aborts_every_sibling() {
    let mut koji = FakeRetirement::new().unavailable("broken");
    for i in 0..8 {
        koji = koji.stalled(&format!("slow{i}"));
    }
    let h = Harness::new(koji, FakeBugTracker::default());

    let mut rows = vec![("broken".to_string(), 1u64)];
    rows.extend((0..8).map(|i| (format!("slow{i}"), i as u64 + 2)));
    let rows: Vec<(&str, u64, &str)> = rows
        .iter()
        .map(|(n, id)| (n.as_str(), *id, "failed"))
        .collect();
    h.monitor(&rows);

    let err = h.run(&ScanOptions::default()).await.unwrap_err();
    match err {
        MonitorError::Retirement { package, .. } => assert_eq!(package, "broken"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.koji.gauge().current(), 0);
}

#[tokio::test]
async fn malformed_monitor_page_is_fatal() {
    let h = Harness::new(FakeRetirement::new(), FakeBugTracker::default());
    h.web.page(
        MONITOR,
        "<a href=\"/coprs/g/python/python3.8/package/foo/\">foo</a>\n\
         <a href=\"/coprs/g/python/python3.8/package/bar/\">bar</a>\n",
    );

    let err = h.run(&ScanOptions::default()).await.unwrap_err();
    assert!(matches!(err, MonitorError::Parse(_)));
    assert!(h.koji.calls().is_empty());
}

#[tokio::test]
async fn unreachable_monitor_page_is_fatal() {
    let h = Harness::new(FakeRetirement::new(), FakeBugTracker::default());

    let err = h.run(&ScanOptions::default()).await.unwrap_err();
    assert!(matches!(err, MonitorError::MonitorPage { ref url, .. } if url == MONITOR));
}
