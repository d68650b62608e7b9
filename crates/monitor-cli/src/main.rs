//! FTBFS monitor CLI
//!
//! `monitor-check` scans the Copr monitor of a mass-rebuild project and
//! prints one colored line per failed package:
//!
//! - red: probably fails to build from source
//! - blue: probably blocked by a dependency
//! - yellow: already reported
//! - green: retired
//! - cyan: excluded from bug filing
//! - magenta: infrastructure flake
//!
//! With `--open-bug-reports`, a pre-filled Bugzilla form is opened for every
//! red package.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fedora_clients::{BugzillaClient, CommandViewer, HttpClient, HttpConfig, KojiCli};
use monitor_core::{
    colors_enabled, init_tracing, level_for, Collaborators, MonitorConfig, Reporter, ScanOptions,
    Scanner,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "monitor-check")]
#[command(author = "Fedora Python SIG")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Triage failed builds of a Copr mass rebuild", long_about = None)]
struct Cli {
    /// Only check these packages
    pkgs: Vec<String>,

    /// TOML configuration file
    #[arg(long, env = "MONITOR_CHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Open a pre-filled bug form for every red package
    #[arg(long, overrides_with = "no_open_bug_reports")]
    open_bug_reports: bool,

    /// Do not open bug forms (default)
    #[arg(long, overrides_with = "open_bug_reports")]
    no_open_bug_reports: bool,

    /// Only open bug forms when a known failure reason is found
    #[arg(long)]
    require_reason: bool,

    /// Write blue package names to this file
    #[arg(long)]
    blues_file: Option<PathBuf>,

    /// Write magenta package names to this file
    #[arg(long)]
    magentas_file: Option<PathBuf>,

    /// Append result directories of failed-but-built packages to this file
    #[arg(long, default_value = "failed_but_built.lst")]
    failed_but_built_file: PathBuf,

    /// Program used to open bug forms
    #[arg(long, default_value = "xdg-open")]
    viewer: String,

    /// Build log length above which a failure is red
    #[arg(long)]
    limit: Option<u64>,

    /// Tracking bug the reports block
    #[arg(long)]
    tracker: Option<u64>,

    /// Koji tag used for the retirement check
    #[arg(long)]
    koji_tag: Option<String>,

    /// Concurrent HTTP requests
    #[arg(long)]
    http_concurrency: Option<usize>,

    /// Concurrent koji invocations
    #[arg(long)]
    command_concurrency: Option<usize>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn load_config(&self) -> Result<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => MonitorConfig::default(),
        };

        if let Some(limit) = self.limit {
            config.limits.default = limit;
        }
        if let Some(tracker) = self.tracker {
            config.tracker = tracker;
        }
        if let Some(tag) = &self.koji_tag {
            config.koji_tag = tag.clone();
        }
        if let Some(http) = self.http_concurrency {
            config.concurrency.http = http;
        }
        if let Some(commands) = self.command_concurrency {
            config.concurrency.commands = commands;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    fn scan_options(&self) -> ScanOptions {
        let open_bug_reports = self.open_bug_reports && !self.no_open_bug_reports;
        ScanOptions {
            packages: self.pkgs.clone(),
            open_bug_reports,
            require_reason: self.require_reason,
            blues_file: self.blues_file.clone(),
            magentas_file: self.magentas_file.clone(),
            failed_but_built_file: open_bug_reports.then(|| self.failed_but_built_file.clone()),
        }
    }
}

fn collaborators(config: &MonitorConfig, viewer: &str) -> Result<Collaborators> {
    let web = HttpClient::new(HttpConfig {
        timeout: config.timeouts.http(),
        ..HttpConfig::default()
    })
    .context("Failed to build HTTP client")?;
    let koji = KojiCli::new(&config.koji_tag).with_timeout(config.timeouts.command());
    let bugzilla = BugzillaClient::new(config.bugzilla.client_config(), config.timeouts.http())
        .context("Failed to build Bugzilla client")?;

    Ok(Collaborators {
        web: Arc::new(web),
        retirement: Arc::new(koji),
        bugs: Arc::new(bugzilla),
        viewer: Arc::new(CommandViewer::new(viewer)),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json, level_for(cli.verbose));

    let config = cli.load_config()?;
    let options = cli.scan_options();
    info!(
        project = %config.project.copr().frontend_path(),
        tag = %config.koji_tag,
        tracker = config.tracker,
        "starting monitor check"
    );

    let reporter = Arc::new(Reporter::stdout(colors_enabled(cli.no_color)));
    let scanner = Scanner::new(
        config.clone(),
        collaborators(&config, &cli.viewer)?,
        Arc::clone(&reporter),
    )?;

    scanner
        .run(&options)
        .await
        .context("Monitor check aborted")?;

    reporter
        .write_summary(&mut io::stderr().lock())
        .context("Failed to write summary")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["monitor-check"]).unwrap();
        let options = cli.scan_options();
        assert!(options.packages.is_empty());
        assert!(!options.open_bug_reports);
        assert_eq!(options.failed_but_built_file, None);
        assert_eq!(cli.viewer, "xdg-open");
    }

    #[test]
    fn test_last_bug_report_flag_wins() {
        let cli = Cli::try_parse_from([
            "monitor-check",
            "--open-bug-reports",
            "--no-open-bug-reports",
        ])
        .unwrap();
        assert!(!cli.scan_options().open_bug_reports);

        let cli = Cli::try_parse_from([
            "monitor-check",
            "--no-open-bug-reports",
            "--open-bug-reports",
            "foo",
            "bar",
        ])
        .unwrap();
        let options = cli.scan_options();
        assert!(options.open_bug_reports);
        assert_eq!(options.packages, vec!["foo", "bar"]);
        assert_eq!(
            options.failed_but_built_file,
            Some(PathBuf::from("failed_but_built.lst"))
        );
    }

    #[test]
    fn test_overrides_apply_on_top_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");
        std::fs::write(&path, "koji_tag = \"f33\"\ntracker = 1\n").unwrap();

        let cli = Cli::try_parse_from([
            "monitor-check",
            "--config",
            path.to_str().unwrap(),
            "--tracker",
            "1785415",
            "--limit",
            "4000",
            "--http-concurrency",
            "5",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.koji_tag, "f33");
        assert_eq!(config.tracker, 1785415);
        assert_eq!(config.limits.default, 4000);
        assert_eq!(config.concurrency.http, 5);
        assert_eq!(config.concurrency.commands, 10);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let cli = Cli::try_parse_from(["monitor-check", "--command-concurrency", "0"]).unwrap();
        assert!(cli.load_config().is_err());
    }
}
