//! Live report output and dump files.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::classify::{Classification, TriageColor};

/// Whether report lines should carry ANSI colors.
pub fn colors_enabled(no_color: bool) -> bool {
    !no_color && std::env::var_os("NO_COLOR").is_none()
}

struct ReporterState {
    counts: BTreeMap<TriageColor, usize>,
    out: Box<dyn Write + Send>,
}

/// Prints classifications as they complete and tallies them per color.
///
/// The line and its counter update happen under one lock, so lines never
/// interleave and the summary always matches what was printed.
pub struct Reporter {
    state: Mutex<ReporterState>,
    color: bool,
}

impl Reporter {
    pub fn new(out: Box<dyn Write + Send>, color: bool) -> Self {
        Reporter {
            state: Mutex::new(ReporterState {
                counts: BTreeMap::new(),
                out,
            }),
            color,
        }
    }

    pub fn stdout(color: bool) -> Self {
        Self::new(Box::new(io::stdout()), color)
    }

    pub fn record(&self, classification: &Classification) -> io::Result<()> {
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        let line = if self.color {
            classification.color.paint(&classification.message)
        } else {
            classification.message.clone()
        };
        writeln!(state.out, "{line}")?;
        state.out.flush()?;
        *state.counts.entry(classification.color).or_insert(0) += 1;
        Ok(())
    }

    /// Per-color counts, most common first.
    pub fn counts(&self) -> Vec<(TriageColor, usize)> {
        let Ok(state) = self.state.lock() else {
            return Vec::new();
        };
        let mut counts: Vec<_> = state.counts.iter().map(|(c, n)| (*c, *n)).collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        counts
    }

    /// Write the per-color summary to `err`.
    pub fn write_summary(&self, err: &mut dyn Write) -> io::Result<()> {
        for (color, count) in self.counts() {
            let line = summary_line(color, count);
            if self.color {
                writeln!(err, "{}", color.paint(&line))?;
            } else {
                writeln!(err, "{line}")?;
            }
        }
        Ok(())
    }
}

pub fn summary_line(color: TriageColor, count: usize) -> String {
    format!(
        "There are {count} {} lines ({})",
        color.name(),
        color.explanation()
    )
}

fn poisoned() -> io::Error {
    io::Error::other("report writer lock poisoned")
}

/// A file receiving one entry per line from many tasks.
#[derive(Debug)]
pub struct DumpFile {
    path: PathBuf,
    file: Mutex<File>,
}

impl DumpFile {
    /// Start the file afresh.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(DumpFile {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Keep whatever earlier runs wrote.
    pub fn append(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(DumpFile {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_line(&self, entry: &str) -> io::Result<()> {
        let mut file = self.file.lock().map_err(|_| poisoned())?;
        writeln!(file, "{entry}")?;
        file.flush()
    }
}
