//! Koji retirement check
//!
//! A retired package is blocked in the target tag; `koji list-pkgs
//! --show-blocked` marks such entries with `[BLOCKED]`.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::RetirementError;
use crate::traits::RetirementChecker;

/// Marker printed by koji next to blocked packages
pub const BLOCKED_MARKER: &str = "[BLOCKED]";

/// Retirement checker backed by the `koji` command-line client
#[derive(Debug, Clone)]
pub struct KojiCli {
    /// Executable to run
    pub program: String,
    /// Tag of the target distribution branch, e.g. `f31`
    pub tag: String,
    /// Upper bound on one invocation
    pub timeout: Duration,
}

impl KojiCli {
    pub fn new(tag: &str) -> Self {
        KojiCli {
            program: "koji".to_string(),
            tag: tag.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn args(&self, package: &str) -> Vec<String> {
        vec![
            "list-pkgs".to_string(),
            "--show-blocked".to_string(),
            "--tag".to_string(),
            self.tag.clone(),
            "--package".to_string(),
            package.to_string(),
        ]
    }
}

#[async_trait]
impl RetirementChecker for KojiCli {
    async fn is_retired(&self, package: &str) -> Result<bool, RetirementError> {
        debug!(package, tag = %self.tag, "koji list-pkgs");

        let child = Command::new(&self.program)
            .args(self.args(package))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RetirementError::Unavailable {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| RetirementError::TimedOut {
                program: self.program.clone(),
                limit: self.timeout,
            })?
            .map_err(|e| RetirementError::Unavailable {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        // koji exits non-zero for packages it has never seen; that is a "no"
        if !output.status.success() {
            debug!(package, code = ?output.status.code(), "koji exited non-zero");
        }

        Ok(is_blocked(&output.stdout))
    }
}

/// Whether `koji list-pkgs` output marks the package as blocked.
pub fn is_blocked(stdout: &[u8]) -> bool {
    String::from_utf8_lossy(stdout).contains(BLOCKED_MARKER)
}
