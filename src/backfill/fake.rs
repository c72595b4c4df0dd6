//! In-memory repository and scanner doubles for sampler and backfill tests.

use crate::error::{Result, TrendError};
use crate::git::{RepoRef, SourceControl};
use crate::report::scanner::ReportGenerator;
use chrono::{DateTime, FixedOffset, Utc};
use std::cell::{Cell, RefCell};
use std::path::Path;

/// Linear first-parent history on a single branch.
pub struct FakeRepo {
    branch: String,
    commits: Vec<(String, DateTime<FixedOffset>)>,
    head: RefCell<String>,
    pub checkouts: RefCell<Vec<String>>,
    pub history_queries: Cell<usize>,
}

impl FakeRepo {
    /// `dates` are RFC 3339 timestamps, oldest first. SHAs are `c0`, `c1`, ….
    pub fn with_dates(branch: &str, dates: &[&str]) -> Self {
        let commits = dates
            .iter()
            .enumerate()
            .map(|(i, d)| (format!("c{i}"), DateTime::parse_from_rfc3339(d).unwrap()))
            .collect();
        FakeRepo {
            branch: branch.to_string(),
            commits,
            head: RefCell::new(branch.to_string()),
            checkouts: RefCell::new(Vec::new()),
            history_queries: Cell::new(0),
        }
    }

    /// One commit on the 15th of each month, `months` months starting at `year`-`month`.
    pub fn monthly(branch: &str, year: i32, month: u32, months: u32) -> Self {
        let dates: Vec<String> = (0..months)
            .map(|i| {
                let m0 = month - 1 + i;
                format!("{}-{:02}-15T12:00:00+00:00", year + (m0 / 12) as i32, m0 % 12 + 1)
            })
            .collect();
        let refs: Vec<&str> = dates.iter().map(String::as_str).collect();
        Self::with_dates(branch, &refs)
    }

    /// Starts the fake detached at `sha` instead of on the branch.
    pub fn detached_at(self, sha: &str) -> Self {
        *self.head.borrow_mut() = sha.to_string();
        self
    }

    pub fn head(&self) -> String {
        self.head.borrow().clone()
    }
}

impl SourceControl for FakeRepo {
    fn current_ref(&self) -> Result<RepoRef> {
        let head = self.head();
        if head == self.branch {
            Ok(RepoRef::Branch(head))
        } else {
            Ok(RepoRef::Detached(head))
        }
    }

    fn branch_exists(&self, branch: &str) -> Result<bool> {
        Ok(branch == self.branch)
    }

    fn first_parent_commits(&self, branch: &str, since: Option<DateTime<Utc>>) -> Result<Vec<String>> {
        self.history_queries.set(self.history_queries.get() + 1);
        if branch != self.branch {
            return Err(TrendError::Git { command: "rev-list".into(), message: "bad revision".into() });
        }
        Ok(self
            .commits
            .iter()
            .filter(|(_, d)| since.map_or(true, |s| d.with_timezone(&Utc) >= s))
            .map(|(sha, _)| sha.clone())
            .collect())
    }

    fn commit_date(&self, sha: &str) -> Result<DateTime<FixedOffset>> {
        self.commits
            .iter()
            .find(|(s, _)| s == sha)
            .map(|(_, d)| *d)
            .ok_or_else(|| TrendError::Git { command: "show".into(), message: format!("unknown {sha}") })
    }

    fn checkout(&self, target: &str) -> Result<()> {
        let known = target == self.branch || self.commits.iter().any(|(s, _)| s == target);
        if !known {
            return Err(TrendError::Git { command: "checkout".into(), message: format!("unknown {target}") });
        }
        *self.head.borrow_mut() = target.to_string();
        self.checkouts.borrow_mut().push(target.to_string());
        Ok(())
    }
}

/// Writes a canned report per call; call `fail_on` (0-based) exits non-zero
/// and calls listed in `empty_on` produce a report without metrics.
pub struct FakeScanner {
    pub calls: Cell<usize>,
    pub fail_on: Option<usize>,
    pub empty_on: Vec<usize>,
    pub malformed_on: Option<usize>,
}

impl FakeScanner {
    pub fn ok() -> Self {
        FakeScanner { calls: Cell::new(0), fail_on: None, empty_on: Vec::new(), malformed_on: None }
    }
}

pub const REPORT: &str = r#"{
    "name": "src", "nodetype": "directory", "children": [
        {"name": "a.py", "nodetype": "file", "docstring": "A.",
         "metrics": {"lines": 10, "duplication": {"score": 0.0}}},
        {"name": "b.py", "nodetype": "file", "docstring": "",
         "metrics": {"lines": 20, "duplication": {"score": 0.5}}}
    ]
}"#;

const EMPTY_REPORT: &str = r#"{"name": "src", "nodetype": "directory", "children": []}"#;

impl ReportGenerator for FakeScanner {
    fn generate(&self, _source: &Path, output: &Path) -> Result<()> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        if self.fail_on == Some(call) {
            return Err(TrendError::tool("scanner", "exited with exit status: 1"));
        }
        let body = if self.malformed_on == Some(call) {
            "{\"children\": 3}"
        } else if self.empty_on.contains(&call) {
            EMPTY_REPORT
        } else {
            REPORT
        };
        std::fs::write(output, body).map_err(|e| TrendError::io(output, e))
    }
}
