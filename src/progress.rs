//! Per-file progress reporting.
//!
//! Progress goes to **stderr** so the run report on stdout stays clean.

use std::io::Write;

use crate::models::FileOutcome;

#[derive(Clone, Debug)]
pub enum ProgressEvent<'a> {
    /// Scan finished; `total` files are eligible.
    Scanned { total: usize },
    /// Work on file `n` of `total` is starting.
    Started { path: &'a str, n: usize, total: usize },
    Finished { path: &'a str, outcome: &'a FileOutcome },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent<'_>);
}

/// Human-friendly lines: `[3/12] lib/models.py ... generated`.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent<'_>) {
        let line = match event {
            ProgressEvent::Scanned { total } => format!("found {} file(s)\n", total),
            ProgressEvent::Started { path, n, total } => format!("[{}/{}] {} ...\n", n, total, path),
            ProgressEvent::Finished { path, outcome } => format!("      {}: {}\n", path, outcome),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent<'_>) {}
}

/// Human progress when stderr is a TTY, otherwise nothing.
pub fn default_reporter() -> Box<dyn ProgressReporter> {
    if atty::is(atty::Stream::Stderr) {
        Box::new(StderrProgress)
    } else {
        Box::new(NoProgress)
    }
}
