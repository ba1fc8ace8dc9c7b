//! On-disk run reports.
//!
//! Layout: `<root>/<mode>/<task>/<run_id>/` holding `report.json`,
//! `attempts.jsonl` (one attempt per line), `summary.md` and one
//! `attempt<N>.py` per generated candidate.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use futures::{Stream, StreamExt};
use log::{debug, error, warn};

use super::summary::render_summary;
use crate::error::{Result, StratloopError};
use crate::orchestrator::{Attempt, Report};

/// Directory name used when a run never produced a valid task id
const UNKNOWN_TASK: &str = "_invalid";

/// Writes reports under a root directory and reads them back.
#[derive(Debug, Clone)]
pub struct ReportStore {
    root: PathBuf,
}

impl ReportStore {
    /// Create a store rooted at the given path, creating it if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory a report is written to.
    pub fn run_dir(&self, report: &Report) -> PathBuf {
        self.root
            .join(report.mode.as_str())
            .join(report.task_id.as_deref().unwrap_or(UNKNOWN_TASK))
            .join(&report.run_id)
    }

    /// Persist every artifact of a run. Returns the run directory.
    pub fn save(&self, report: &Report) -> Result<PathBuf> {
        let dir = self.run_dir(report);
        fs::create_dir_all(&dir)?;

        fs::write(dir.join("report.json"), serde_json::to_string_pretty(report)?)?;

        let mut attempts = File::create(dir.join("attempts.jsonl"))?;
        for attempt in &report.attempts {
            writeln!(attempts, "{}", serde_json::to_string(attempt)?)?;
        }

        for attempt in &report.attempts {
            if !attempt.code.is_empty() {
                fs::write(dir.join(format!("attempt{}.py", attempt.number)), &attempt.code)?;
            }
        }

        fs::write(dir.join("summary.md"), render_summary(report))?;
        debug!("Saved report {} to {}", report.run_id, dir.display());
        Ok(dir)
    }

    /// Read one report back.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Report> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Read an attempts log back.
    pub fn load_attempts(&self, run_dir: impl AsRef<Path>) -> Result<Vec<Attempt>> {
        let file = File::open(run_dir.as_ref().join("attempts.jsonl"))?;
        let mut attempts = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if !line.trim().is_empty() {
                attempts.push(serde_json::from_str(&line)?);
            }
        }
        Ok(attempts)
    }

    /// Every report under the root, oldest run first. Unreadable files are skipped.
    pub fn load_all(&self) -> Result<Vec<Report>> {
        let pattern = self.root.join("**").join("report.json");
        let pattern = pattern.to_string_lossy();
        let paths = glob::glob(&pattern).map_err(|e| StratloopError::Storage(format!("Invalid pattern: {}", e)))?;

        let mut reports = Vec::new();
        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping unreadable path: {}", e);
                    continue;
                }
            };
            match self.load(&path) {
                Ok(report) => reports.push(report),
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }
        reports.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.run_id.cmp(&b.run_id)));
        Ok(reports)
    }
}

/// Counts gathered by [`save_as_completed`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveTally {
    pub total: usize,
    pub accepted: usize,
    pub saved: usize,
}

/// Save every report as soon as the stream yields it.
///
/// A failed save is logged and the remaining reports are still written.
/// `on_report` sees each report together with its run directory, or `None`
/// when that report could not be saved.
pub async fn save_as_completed<S, F>(reports: S, store: &ReportStore, mut on_report: F) -> SaveTally
where
    S: Stream<Item = Report>,
    F: FnMut(&Report, Option<&Path>),
{
    let mut tally = SaveTally::default();
    let mut reports = std::pin::pin!(reports);
    while let Some(report) = reports.next().await {
        tally.total += 1;
        if report.is_accepted() {
            tally.accepted += 1;
        }
        match store.save(&report) {
            Ok(dir) => {
                tally.saved += 1;
                on_report(&report, Some(&dir));
            }
            Err(e) => {
                error!("Failed to save report {}: {}", report.run_id, e);
                on_report(&report, None);
            }
        }
    }
    tally
}
