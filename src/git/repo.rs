use super::{RepoRef, SourceControl};
use crate::error::{Result, TrendError};
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// A git working tree driven through the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
}

/// `git` with `GIT_DIR` / `GIT_WORK_TREE` stripped so the explicit `-C` path wins.
fn git_cmd() -> Command {
    let mut cmd = Command::new("git");
    cmd.env_remove("GIT_DIR").env_remove("GIT_WORK_TREE");
    cmd
}

pub fn git_available() -> bool {
    git_cmd()
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

impl GitRepo {
    /// Opens `path`, failing with a configuration error if it is not inside a work tree.
    pub fn open(path: &Path) -> Result<Self> {
        if !git_available() {
            return Err(TrendError::Configuration("git executable not found on PATH".into()));
        }
        let repo = GitRepo { root: path.to_path_buf() };
        let inside = repo
            .run(&["rev-parse", "--is-inside-work-tree"])
            .map(|out| out.trim() == "true")
            .unwrap_or(false);
        if !inside {
            return Err(TrendError::Configuration(format!(
                "not a git repository: {}",
                path.display()
            )));
        }
        Ok(repo)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Runs `git -C <root> <args>` and returns stdout, or the trimmed stderr as an error.
    fn run(&self, args: &[&str]) -> Result<String> {
        debug!(repo = %self.root.display(), args = ?args, "git");
        let output = git_cmd()
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .output()
            .map_err(|e| TrendError::Git {
                command: args.first().copied().unwrap_or("").to_string(),
                message: format!("failed to run git: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TrendError::Git {
                command: args.join(" "),
                message: stderr.trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl SourceControl for GitRepo {
    fn current_ref(&self) -> Result<RepoRef> {
        let name = self.run(&["rev-parse", "--abbrev-ref", "HEAD"])?.trim().to_string();
        if name == "HEAD" {
            let sha = self.run(&["rev-parse", "HEAD"])?.trim().to_string();
            Ok(RepoRef::Detached(sha))
        } else {
            Ok(RepoRef::Branch(name))
        }
    }

    fn branch_exists(&self, branch: &str) -> Result<bool> {
        let status = git_cmd()
            .arg("-C")
            .arg(&self.root)
            .args(["show-ref", "--verify", "--quiet"])
            .arg(format!("refs/heads/{branch}"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| TrendError::Git {
                command: "show-ref".into(),
                message: format!("failed to run git: {e}"),
            })?;
        Ok(status.success())
    }

    fn first_parent_commits(&self, branch: &str, since: Option<DateTime<Utc>>) -> Result<Vec<String>> {
        let mut args: Vec<String> = vec![
            "rev-list".into(),
            "--first-parent".into(),
            "--reverse".into(),
        ];
        if let Some(since) = since {
            args.push(format!("--since={}", since.to_rfc3339_opts(SecondsFormat::Secs, false)));
        }
        args.push(branch.to_string());
        args.push("--".into());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.run(&arg_refs)?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn commit_date(&self, sha: &str) -> Result<DateTime<FixedOffset>> {
        let out = self.run(&["show", "-s", "--format=%cI", sha])?;
        let text = out.trim();
        DateTime::parse_from_rfc3339(text).map_err(|e| TrendError::Git {
            command: "show".into(),
            message: format!("unparseable commit date '{text}' for {sha}: {e}"),
        })
    }

    fn checkout(&self, target: &str) -> Result<()> {
        self.run(&["checkout", "--quiet", target]).map(|_| ())
    }
}
