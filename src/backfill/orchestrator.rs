use super::guard::CheckoutGuard;
use super::sampler::sample_monthly;
use crate::error::{Result, TrendError};
use crate::git::SourceControl;
use crate::report::aggregate::aggregate;
use crate::report::cloc::{line_count_fields, LineCounter};
use crate::report::flatten::load_rows;
use crate::report::scanner::ReportGenerator;
use crate::types::{AggregateRecord, CommitSnapshot};
use chrono::NaiveDate;
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct BackfillOptions {
    pub branch: String,
    /// Directory handed to the scanner and line counter; lives inside the work tree.
    pub source_dir: PathBuf,
    pub max_months: Option<usize>,
    /// Calendar day the month walk starts from.
    pub today: NaiveDate,
    /// File name the scanner writes its report to.
    pub report_name: String,
}

/// Records a run collected, oldest first, and the failure that stopped it early.
#[derive(Debug)]
pub struct BackfillOutcome {
    pub records: Vec<AggregateRecord>,
    pub aborted: Option<TrendError>,
}

/// Replays monthly snapshots of a branch through the scanner and aggregator.
pub struct Backfill<'a> {
    repo: &'a dyn SourceControl,
    scanner: &'a dyn ReportGenerator,
    counter: &'a dyn LineCounter,
    progress: ProgressBar,
}

impl<'a> Backfill<'a> {
    pub fn new(
        repo: &'a dyn SourceControl,
        scanner: &'a dyn ReportGenerator,
        counter: &'a dyn LineCounter,
    ) -> Self {
        Backfill { repo, scanner, counter, progress: ProgressBar::hidden() }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Produces one record per sampled month, oldest first.
    ///
    /// The working tree is checked out at every sampled commit and returned to
    /// the starting reference afterwards, on success and on failure alike.
    /// Months whose report has no metrics are skipped. Any other failure while
    /// processing a snapshot stops the walk; the records collected until then
    /// are still returned, with the failure in [`BackfillOutcome::aborted`].
    /// Errors before the first checkout are returned as `Err`.
    pub fn run(&self, options: &BackfillOptions) -> Result<BackfillOutcome> {
        if !self.repo.branch_exists(&options.branch)? {
            return Err(TrendError::Configuration(format!(
                "branch '{}' does not exist",
                options.branch
            )));
        }

        let guard = CheckoutGuard::capture(self.repo)?;
        self.repo.checkout(&options.branch)?;

        let snapshots = sample_monthly(self.repo, &options.branch, options.today, options.max_months)?;
        info!(branch = %options.branch, snapshots = snapshots.len(), "sampled monthly snapshots");

        let workdir = tempfile::tempdir().map_err(|e| TrendError::io(std::env::temp_dir(), e))?;
        let report_path = workdir.path().join(&options.report_name);

        self.progress.set_length(snapshots.len() as u64);
        let mut records = Vec::with_capacity(snapshots.len());
        let mut aborted = None;
        for snapshot in &snapshots {
            self.progress.set_message(format!("{} ({})", snapshot.short_sha(), snapshot.date()));
            match self.process(snapshot, &options.source_dir, &report_path) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => {
                    error!(sha = %snapshot.sha, date = %snapshot.date(), error = %e, "aborting backfill");
                    aborted = Some(e);
                    break;
                }
            }
            self.progress.inc(1);
        }
        self.progress.finish_and_clear();

        records.sort_by_key(|r| r.date);
        if let Err(e) = guard.restore() {
            error!(error = %e, "could not restore starting reference");
            aborted.get_or_insert(e);
        }
        Ok(BackfillOutcome { records, aborted })
    }

    fn process(
        &self,
        snapshot: &CommitSnapshot,
        source_dir: &Path,
        report_path: &Path,
    ) -> Result<Option<AggregateRecord>> {
        self.repo.checkout(&snapshot.sha)?;

        if report_path.exists() {
            std::fs::remove_file(report_path).map_err(|e| TrendError::io(report_path, e))?;
        }
        self.scanner.generate(source_dir, report_path)?;

        let rows = load_rows(report_path)?;
        let mut record = match aggregate(&rows, snapshot.date()) {
            Ok(record) => record,
            Err(e) if e.is_recoverable() => {
                warn!(sha = %snapshot.sha, date = %snapshot.date(), "{e}; skipping month");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        record.extend(line_count_fields(self.counter, source_dir));
        info!(sha = %snapshot.short_sha(), date = %snapshot.date(), "snapshot aggregated");
        Ok(Some(record))
    }
}
