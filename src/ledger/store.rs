use super::table::Ledger;
use crate::error::{Result, TrendError};
use crate::types::AggregateRecord;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Where the ledger CSV lives.
///
/// Writers replace the whole file. There is no locking: two concurrent
/// appenders can lose one another's row.
pub trait LedgerStore {
    /// Current content, or `None` if the ledger does not exist yet.
    fn read(&self) -> Result<Option<String>>;

    /// Replaces the content in one step and returns an identifier for the
    /// new version (a commit id for remote stores).
    fn replace(&self, content: &str, message: &str) -> Result<String>;

    /// Human-readable location for log and status lines.
    fn describe(&self) -> String;
}

/// Ledger kept in a file on disk.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LocalStore { path: path.into() }
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl LedgerStore for LocalStore {
    fn read(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TrendError::io(&self.path, e)),
        }
    }

    fn replace(&self, content: &str, _message: &str) -> Result<String> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        // Write beside the target and rename over it so readers never see a partial file.
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| TrendError::io(&dir, e))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| TrendError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| TrendError::io(&self.path, e.error))?;
        Ok(self.path.display().to_string())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

pub fn commit_message(record: &AggregateRecord) -> String {
    format!("Append metrics for {}", record.date.format("%Y-%m-%d"))
}

/// Reads the ledger, appends `records` in order and writes it back as one version.
pub fn append_records(
    store: &dyn LedgerStore,
    records: &[AggregateRecord],
    message: &str,
) -> Result<String> {
    let mut ledger = match store.read()? {
        Some(text) => Ledger::from_csv(&text)?,
        None => Ledger::default(),
    };
    for record in records {
        ledger.append(record);
    }
    let version = store.replace(&ledger.to_csv()?, message)?;
    info!(store = %store.describe(), rows = ledger.len(), appended = records.len(), "ledger updated");
    Ok(version)
}

pub fn append_record(store: &dyn LedgerStore, record: &AggregateRecord) -> Result<String> {
    append_records(store, std::slice::from_ref(record), &commit_message(record))
}
