pub mod repo;

use crate::error::Result;
use chrono::{DateTime, FixedOffset, Utc};

/// What HEAD pointed at before a run touched the working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoRef {
    Branch(String),
    Detached(String),
}

impl RepoRef {
    /// Argument that checks this reference back out.
    pub fn checkout_target(&self) -> &str {
        match self {
            RepoRef::Branch(name) => name,
            RepoRef::Detached(sha) => sha,
        }
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepoRef::Branch(name) => write!(f, "branch {name}"),
            RepoRef::Detached(sha) => write!(f, "detached {sha}"),
        }
    }
}

/// The queries and the one mutation the backfill needs from a repository.
///
/// `checkout` rewrites the shared working tree, so a handle must have exactly
/// one user at a time.
pub trait SourceControl {
    fn current_ref(&self) -> Result<RepoRef>;

    fn branch_exists(&self, branch: &str) -> Result<bool>;

    /// First-parent commits reachable from `branch`, oldest first, optionally
    /// limited to commits dated at or after `since`.
    fn first_parent_commits(&self, branch: &str, since: Option<DateTime<Utc>>) -> Result<Vec<String>>;

    fn commit_date(&self, sha: &str) -> Result<DateTime<FixedOffset>>;

    fn checkout(&self, target: &str) -> Result<()>;
}
