//! Failure signatures read from the live build log.

/// Phrases left by dnf when a build dependency cannot be installed
const UNSATISFIABLE: &[&str] = &[
    "No matching package to install",
    "nothing provides",
    "conflicting requests",
];

/// Phrases left when a repository mirror could not be reached
const REPO_METADATA: &[&str] = &[
    "Failed to download metadata for repo",
    "Cannot download repomd.xml",
];

const TIMED_OUT: &[&str] = &["Operation timed out", "Copr timeout"];

/// Minimum number of repository failures before a build counts as a flake.
pub const REPO_METADATA_THRESHOLD: usize = 3;

/// What a build log says about the cause of a failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogSignals {
    pub unsatisfiable: bool,
    pub repo_metadata_failures: usize,
    pub timed_out: bool,
}

impl LogSignals {
    pub fn scan(log: &str) -> Self {
        LogSignals {
            unsatisfiable: UNSATISFIABLE.iter().any(|p| log.contains(p)),
            repo_metadata_failures: REPO_METADATA.iter().map(|p| log.matches(p).count()).sum(),
            timed_out: TIMED_OUT.iter().any(|p| log.contains(p)),
        }
    }

    /// Which infrastructure problem, if any, explains the failure.
    pub fn infra_flake(&self) -> Option<InfraFlake> {
        if self.repo_metadata_failures >= REPO_METADATA_THRESHOLD {
            Some(InfraFlake::RepoMetadata)
        } else if self.timed_out {
            Some(InfraFlake::Timeout)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfraFlake {
    RepoMetadata,
    Timeout,
}

impl InfraFlake {
    pub fn label(&self) -> &'static str {
        match self {
            InfraFlake::RepoMetadata => "repo metadata",
            InfraFlake::Timeout => "timeout",
        }
    }
}
