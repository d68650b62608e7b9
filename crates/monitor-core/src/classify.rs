//! Triage of one failed build.
//!
//! [`classify`] is a pure function of the evidence gathered for a package,
//! so the precedence rules can be tested without any network.

use std::fmt;

use fedora_clients::Bug;
use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};

use crate::signals::LogSignals;

/// Triage color of a classified package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriageColor {
    Red,
    Blue,
    Yellow,
    Green,
    Cyan,
    Magenta,
}

impl TriageColor {
    pub const ALL: [TriageColor; 6] = [
        TriageColor::Red,
        TriageColor::Blue,
        TriageColor::Yellow,
        TriageColor::Green,
        TriageColor::Cyan,
        TriageColor::Magenta,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TriageColor::Red => "red",
            TriageColor::Blue => "blue",
            TriageColor::Yellow => "yellow",
            TriageColor::Green => "green",
            TriageColor::Cyan => "cyan",
            TriageColor::Magenta => "magenta",
        }
    }

    /// What the color means for the person reading the report.
    pub fn explanation(&self) -> &'static str {
        match self {
            TriageColor::Red => "probably FTBFS",
            TriageColor::Blue => "probably blocked",
            TriageColor::Yellow => "reported",
            TriageColor::Green => "retired",
            TriageColor::Cyan => "excluded from bug filing",
            TriageColor::Magenta => "infrastructure flake",
        }
    }

    /// Render `text` in this color for a terminal.
    pub fn paint(&self, text: &str) -> String {
        match self {
            TriageColor::Red => text.red().to_string(),
            TriageColor::Blue => text.blue().to_string(),
            TriageColor::Yellow => text.yellow().to_string(),
            TriageColor::Green => text.green().to_string(),
            TriageColor::Cyan => text.cyan().to_string(),
            TriageColor::Magenta => text.magenta().to_string(),
        }
    }
}

impl fmt::Display for TriageColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Final verdict for one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub package: String,
    pub color: TriageColor,
    pub message: String,
}

/// Everything known about a failed package at classification time.
///
/// `signals` is `None` when the live log was not consulted, either because an
/// earlier rule already decided or because the log could not be read.
#[derive(Debug, Clone, Default)]
pub struct Evidence<'a> {
    pub retired: bool,
    pub log_length: Option<u64>,
    pub critical_path: bool,
    pub exclusion: Option<&'a str>,
    pub bug: Option<&'a Bug>,
    pub signals: Option<LogSignals>,
    pub limit: u64,
}

impl Evidence<'_> {
    /// Whether the live log has to be read before a color can be chosen.
    pub fn needs_log(&self) -> bool {
        !self.retired && self.exclusion.is_none() && !self.bug.is_some_and(|b| !b.is_closed())
    }

    /// A long build log means the build got far, so the failure is likely
    /// in the package itself. An unknown length never counts.
    pub fn substantial(&self) -> bool {
        self.log_length.is_some_and(|len| len > self.limit)
    }
}

const FIRE: &str = "\u{1F525}";

pub fn classify(package: &str, evidence: &Evidence<'_>) -> Classification {
    if evidence.retired {
        return Classification {
            package: package.to_string(),
            color: TriageColor::Green,
            message: format!("{package} is retired"),
        };
    }

    let length = match evidence.log_length {
        Some(len) => len.to_string(),
        None => "?".to_string(),
    };
    let mut message = format!("{package} failed len={length}");

    let color = if let Some(reason) = evidence.exclusion {
        message.push_str(&format!(" (excluded: {reason})"));
        TriageColor::Cyan
    } else {
        let mut color = None;
        if let Some(bug) = evidence.bug {
            message.push_str(&format!(" bz{} {}", bug.id, bug.status));
            if !bug.is_closed() {
                color = Some(TriageColor::Yellow);
            }
        }

        match color {
            Some(color) => color,
            None => classify_untracked(evidence, &mut message),
        }
    };

    if evidence.critical_path {
        message.push(' ');
        message.push_str(FIRE);
    }

    Classification {
        package: package.to_string(),
        color,
        message,
    }
}

fn classify_untracked(evidence: &Evidence<'_>, message: &mut String) -> TriageColor {
    if let Some(signals) = evidence.signals {
        if let Some(flake) = signals.infra_flake() {
            message.push_str(&format!(" (infra: {})", flake.label()));
            return TriageColor::Magenta;
        }
        if signals.unsatisfiable {
            message.push_str(" (unresolvable deps)");
            return TriageColor::Blue;
        }
    }

    if evidence.substantial() {
        TriageColor::Red
    } else {
        TriageColor::Blue
    }
}
