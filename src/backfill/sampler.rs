use crate::error::{Result, TrendError};
use crate::git::SourceControl;
use crate::types::CommitSnapshot;
use chrono::{DateTime, Datelike, FixedOffset, Months, NaiveDate, NaiveTime, Utc};
use std::collections::HashSet;
use tracing::debug;

/// Upper bound on months walked back from today: 200 years.
pub const MONTH_SCAN_CAP: usize = 2400;

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Month starts from the current month backwards, at most `limit` entries.
pub fn month_starts_descending(today: NaiveDate, limit: usize) -> Vec<NaiveDate> {
    let mut starts = Vec::with_capacity(limit.min(MONTH_SCAN_CAP));
    let mut current = Some(first_of_month(today));
    while let Some(month) = current {
        if starts.len() >= limit {
            break;
        }
        starts.push(month);
        current = month.checked_sub_months(Months::new(1));
    }
    starts
}

/// Commit date of the oldest commit on `branch`'s first-parent line.
pub fn earliest_commit_date(repo: &dyn SourceControl, branch: &str) -> Result<DateTime<FixedOffset>> {
    let commits = repo.first_parent_commits(branch, None)?;
    let oldest = commits
        .first()
        .ok_or_else(|| TrendError::Configuration(format!("no commits found on branch {branch}")))?;
    repo.commit_date(oldest)
}

/// Picks at most one first-parent commit per calendar month, newest month first.
///
/// For each month start (UTC midnight) the first commit at or after it is taken.
/// Months with nothing new resolve to a commit already picked for a later month
/// and are skipped, as are months past the end of history.
pub fn sample_monthly(
    repo: &dyn SourceControl,
    branch: &str,
    today: NaiveDate,
    max_months: Option<usize>,
) -> Result<Vec<CommitSnapshot>> {
    // Month starts are UTC instants, so the cut-off month is taken in UTC too.
    let earliest = earliest_commit_date(repo, branch)?;
    let earliest_month = first_of_month(earliest.with_timezone(&Utc).date_naive());
    let limit = max_months.unwrap_or(MONTH_SCAN_CAP).min(MONTH_SCAN_CAP);

    let mut seen: HashSet<String> = HashSet::new();
    let mut snapshots = Vec::new();

    for month_start in month_starts_descending(today, limit) {
        if month_start < earliest_month {
            break;
        }

        let since = month_start.and_time(NaiveTime::MIN).and_utc();
        let Some(sha) = repo.first_parent_commits(branch, Some(since))?.into_iter().next() else {
            debug!(month = %month_start, "no commits on or after month start");
            continue;
        };
        if !seen.insert(sha.clone()) {
            debug!(month = %month_start, sha = %sha, "commit already sampled for a later month");
            continue;
        }

        let commit_date = repo.commit_date(&sha)?;
        debug!(month = %month_start, sha = %sha, date = %commit_date, "sampled");
        snapshots.push(CommitSnapshot { sha, commit_date });
    }

    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backfill::fake::FakeRepo;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_starts_cross_year_boundary() {
        let starts = month_starts_descending(day(2024, 2, 29), 4);
        assert_eq!(starts, vec![day(2024, 2, 1), day(2024, 1, 1), day(2023, 12, 1), day(2023, 11, 1)]);
    }

    #[test]
    fn test_month_starts_cap_covers_two_centuries() {
        let starts = month_starts_descending(day(2026, 10, 16), MONTH_SCAN_CAP);
        assert_eq!(starts.len(), MONTH_SCAN_CAP);
        assert_eq!(*starts.last().unwrap(), day(1826, 11, 1));
    }

    #[test]
    fn test_one_commit_per_month_for_a_year() {
        let repo = FakeRepo::monthly("main", 2023, 1, 12);
        let snaps = sample_monthly(&repo, "main", day(2024, 3, 10), None).unwrap();
        assert_eq!(snaps.len(), 12);

        let mut dates: Vec<_> = snaps.iter().map(|s| s.commit_date).collect();
        dates.reverse();
        assert!(dates.windows(2).all(|w| w[0] < w[1]), "dates must strictly increase");
        let months: HashSet<u32> = snaps.iter().map(|s| s.date().month()).collect();
        assert_eq!(months.len(), 12, "one snapshot per month");
    }

    #[test]
    fn test_snapshots_come_newest_first() {
        let repo = FakeRepo::monthly("main", 2023, 1, 3);
        let snaps = sample_monthly(&repo, "main", day(2023, 3, 20), None).unwrap();
        let shas: Vec<&str> = snaps.iter().map(|s| s.sha.as_str()).collect();
        assert_eq!(shas, vec!["c2", "c1", "c0"]);
    }

    #[test]
    fn test_gap_months_emit_nothing_and_no_duplicates() {
        // Jan, Feb, then nothing in Mar/Apr/May, then Jun.
        let repo = FakeRepo::with_dates(
            "main",
            &[
                "2023-01-10T09:00:00+00:00",
                "2023-02-10T09:00:00+00:00",
                "2023-06-10T09:00:00+00:00",
            ],
        );
        let snaps = sample_monthly(&repo, "main", day(2023, 7, 1), None).unwrap();
        let shas: Vec<&str> = snaps.iter().map(|s| s.sha.as_str()).collect();
        assert_eq!(shas, vec!["c2", "c1", "c0"]);
        let unique: HashSet<&str> = shas.iter().copied().collect();
        assert_eq!(unique.len(), shas.len());
    }

    #[test]
    fn test_single_commit_repo_yields_one_snapshot() {
        let repo = FakeRepo::with_dates("main", &["2020-05-05T05:05:05+00:00"]);
        let snaps = sample_monthly(&repo, "main", day(2026, 10, 16), None).unwrap();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].sha, "c0");
        assert_eq!(snaps[0].date(), day(2020, 5, 5));
    }

    #[test]
    fn test_stops_at_earliest_month() {
        let repo = FakeRepo::monthly("main", 2024, 1, 2);
        sample_monthly(&repo, "main", day(2024, 6, 1), None).unwrap();
        // One query for the earliest date plus one per month Jun..Jan (6 months).
        assert_eq!(repo.history_queries.get(), 7);
    }

    #[test]
    fn test_max_months_limits_the_walk() {
        let repo = FakeRepo::monthly("main", 2023, 1, 12);
        let snaps = sample_monthly(&repo, "main", day(2023, 12, 31), Some(3)).unwrap();
        let shas: Vec<&str> = snaps.iter().map(|s| s.sha.as_str()).collect();
        assert_eq!(shas, vec!["c11", "c10", "c9"]);
    }

    #[test]
    fn test_earliest_month_is_taken_in_utc() {
        let repo = FakeRepo::with_dates("main", &["2023-01-01T00:30:00+02:00", "2023-03-20T10:00:00+00:00"]);
        let snaps = sample_monthly(&repo, "main", day(2023, 3, 31), None).unwrap();
        // c0 is Dec 31st in UTC: December's month start must still be scanned to reach it,
        // while the snapshot keeps the committer-local date.
        assert_eq!(snaps.iter().map(|s| s.sha.as_str()).collect::<Vec<_>>(), vec!["c1", "c0"]);
        assert_eq!(snaps[1].date(), day(2023, 1, 1));
    }

    #[test]
    fn test_empty_branch_is_a_configuration_error() {
        let repo = FakeRepo::with_dates("main", &[]);
        assert!(matches!(
            sample_monthly(&repo, "main", day(2024, 1, 1), None),
            Err(TrendError::Configuration(_))
        ));
    }
}
