use std::path::PathBuf;
use thiserror::Error;

/// Every failure the pipeline can surface, grouped by how the backfill loop
/// treats it (see [`TrendError::is_recoverable`]).
#[derive(Debug, Error)]
pub enum TrendError {
    /// Bad settings, missing tools, unknown branch. Raised before any work starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Scanner output did not parse into the expected report tree.
    #[error("malformed report: {0}")]
    MalformedReport(String),

    /// A snapshot produced no metric-bearing nodes.
    #[error("no metric-bearing nodes in report")]
    EmptyMetrics,

    /// An external program exited non-zero, timed out, or could not be spawned.
    #[error("{tool} failed: {message}")]
    ExternalTool { tool: String, message: String },

    /// The ledger store rejected a read or a commit.
    #[error("ledger store error: {0}")]
    RemoteStore(String),

    /// A git query or checkout failed.
    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, TrendError>;

impl TrendError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TrendError::Io { path: path.into(), source }
    }

    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        TrendError::ExternalTool { tool: tool.into(), message: message.into() }
    }

    /// Errors after which a backfill run skips the month and keeps going.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TrendError::EmptyMetrics)
    }

    /// Process exit code reported by `main`.
    pub fn exit_code(&self) -> i32 {
        match self {
            TrendError::Configuration(_) => 2,
            _ => 1,
        }
    }
}
