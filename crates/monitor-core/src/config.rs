//! Run configuration.
//!
//! Built once at startup from defaults, an optional TOML file and CLI
//! overrides, then shared read-only by every classification task.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use fedora_clients::bugzilla::BUGZILLA_URL;
use fedora_clients::copr::{COPR_BACKEND, COPR_FRONTEND};
use fedora_clients::pdc::PDC_COMPONENT_BRANCHES;
use fedora_clients::{BugzillaConfig, CoprProject, Pdc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Copr project whose monitor is scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub owner: String,
    pub name: String,
    pub chroot: String,
    pub frontend: String,
    pub backend: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            owner: "@python".to_string(),
            name: "python3.8".to_string(),
            chroot: "fedora-rawhide-x86_64".to_string(),
            frontend: COPR_FRONTEND.to_string(),
            backend: COPR_BACKEND.to_string(),
        }
    }
}

impl ProjectConfig {
    pub fn copr(&self) -> CoprProject {
        CoprProject {
            owner: self.owner.clone(),
            name: self.name.clone(),
            chroot: self.chroot.clone(),
            frontend: self.frontend.clone(),
            backend: self.backend.clone(),
        }
    }
}

/// Build-log length above which a failure counts as "substantial output".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitTable {
    pub default: u64,
    /// Per-package overrides for packages with chatty or terse builds
    pub packages: BTreeMap<String, u64>,
}

impl Default for LimitTable {
    fn default() -> Self {
        Self {
            default: 1200,
            packages: BTreeMap::new(),
        }
    }
}

impl LimitTable {
    pub fn limit_for(&self, package: &str) -> u64 {
        self.packages.get(package).copied().unwrap_or(self.default)
    }
}

/// Packages never reported automatically, with the reason shown to the
/// operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionTable(BTreeMap<String, String>);

impl Default for ExclusionTable {
    fn default() -> Self {
        let mut table = BTreeMap::new();
        table.insert("pyxattr".to_string(), "fails in Copr only".to_string());
        ExclusionTable(table)
    }
}

impl ExclusionTable {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        ExclusionTable(entries.into_iter().collect())
    }

    pub fn reason(&self, package: &str) -> Option<&str> {
        self.0.get(package).map(String::as_str)
    }
}

/// A known failure signature, as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonSpec {
    /// Short description used in the bug summary
    pub name: String,
    /// Regular expression matched against the live build log
    pub pattern: String,
}

impl ReasonSpec {
    fn new(name: &str, pattern: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
        }
    }
}

fn default_reasons() -> Vec<ReasonSpec> {
    vec![
        ReasonSpec::new(
            "time.clock() removed",
            r"AttributeError: module 'time' has no attribute 'clock'",
        ),
        ReasonSpec::new(
            "cgi.escape() removed",
            r"AttributeError: module 'cgi' has no attribute 'escape'",
        ),
        ReasonSpec::new(
            "unpackaged files",
            r"error: Installed \(but unpackaged\) file\(s\) found:",
        ),
    ]
}

/// Compiled failure signatures, checked in configuration order.
#[derive(Debug, Clone)]
pub struct ReasonTable {
    entries: Vec<(String, Regex)>,
}

impl ReasonTable {
    pub fn compile(specs: &[ReasonSpec]) -> Result<Self, ConfigError> {
        let entries = specs
            .iter()
            .map(|spec| {
                Regex::new(&spec.pattern)
                    .map(|re| (spec.name.clone(), re))
                    .map_err(|source| ConfigError::ReasonPattern {
                        name: spec.name.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    /// Name of the first signature found in `log`.
    pub fn first_match(&self, log: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, re)| re.is_match(log))
            .map(|(name, _)| name.as_str())
    }
}

/// Admission limits of the two fan-out gates and the viewer cool-down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Concurrent HTTP requests
    pub http: usize,
    /// Concurrent external commands
    pub commands: usize,
    /// Pause after each opened bug form, in milliseconds
    pub viewer_cooldown_ms: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            http: 20,
            commands: 10,
            viewer_cooldown_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub http_secs: u64,
    pub command_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            http_secs: 60,
            command_secs: 120,
        }
    }
}

impl TimeoutConfig {
    pub fn http(&self) -> Duration {
        Duration::from_secs(self.http_secs)
    }

    pub fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdcConfig {
    pub endpoint: String,
    pub branch: String,
}

impl Default for PdcConfig {
    fn default() -> Self {
        Self {
            endpoint: PDC_COMPONENT_BRANCHES.to_string(),
            branch: "master".to_string(),
        }
    }
}

impl PdcConfig {
    pub fn client(&self) -> Pdc {
        Pdc::new(&self.endpoint, &self.branch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BugzillaSection {
    pub url: String,
    pub product: String,
}

impl Default for BugzillaSection {
    fn default() -> Self {
        Self {
            url: BUGZILLA_URL.to_string(),
            product: "Fedora".to_string(),
        }
    }
}

impl BugzillaSection {
    /// Client settings; the API key still comes from the environment.
    pub fn client_config(&self) -> BugzillaConfig {
        BugzillaConfig {
            url: self.url.clone(),
            product: self.product.clone(),
            ..BugzillaConfig::from_env()
        }
    }
}

/// Everything a monitor run needs to know up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub project: ProjectConfig,
    /// Koji tag of the target branch, used for the retirement check
    pub koji_tag: String,
    /// Tracking bug all reports block
    pub tracker: u64,
    /// Human name of the new interpreter, used in bug reports
    pub interpreter: String,
    pub limits: LimitTable,
    pub exclusions: ExclusionTable,
    pub reasons: Vec<ReasonSpec>,
    pub concurrency: ConcurrencyConfig,
    pub timeouts: TimeoutConfig,
    pub pdc: PdcConfig,
    pub bugzilla: BugzillaSection,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            koji_tag: "f31".to_string(),
            tracker: 1686977,
            interpreter: "Python 3.8".to_string(),
            limits: LimitTable::default(),
            exclusions: ExclusionTable::default(),
            reasons: default_reasons(),
            concurrency: ConcurrencyConfig::default(),
            timeouts: TimeoutConfig::default(),
            pdc: PdcConfig::default(),
            bugzilla: BugzillaSection::default(),
        }
    }
}

impl MonitorConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = toml::from_str(text).map_err(|source| ConfigError::Toml {
            path: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text, &path.display().to_string())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency.http == 0 {
            return Err(invalid("concurrency.http", "must be at least 1"));
        }
        if self.concurrency.commands == 0 {
            return Err(invalid("concurrency.commands", "must be at least 1"));
        }
        if self.project.owner.is_empty() || self.project.name.is_empty() {
            return Err(invalid("project", "owner and name are required"));
        }
        if self.koji_tag.is_empty() {
            return Err(invalid("koji_tag", "must not be empty"));
        }
        Ok(())
    }

    pub fn reason_table(&self) -> Result<ReasonTable, ConfigError> {
        ReasonTable::compile(&self.reasons)
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
