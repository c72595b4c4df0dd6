use crate::error::{Result, TrendError};
use crate::types::Scalar;
use std::path::Path;
use std::process::Command;
use tracing::warn;

/// Line totals for one language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineCounts {
    pub files: i64,
    pub blank: i64,
    pub comment: i64,
    pub code: i64,
}

impl LineCounts {
    pub fn into_fields(self) -> Vec<(String, Scalar)> {
        vec![
            ("files".to_string(), Scalar::Int(self.files)),
            ("lines blank".to_string(), Scalar::Int(self.blank)),
            ("lines comment".to_string(), Scalar::Int(self.comment)),
            ("lines code".to_string(), Scalar::Int(self.code)),
        ]
    }
}

/// Counts blank / comment / code lines under a path.
pub trait LineCounter {
    /// `Ok(None)` when the configured language was not detected.
    fn count(&self, path: &Path) -> Result<Option<LineCounts>>;
}

/// `cloc --json` restricted to one language entry.
#[derive(Debug, Clone)]
pub struct Cloc {
    pub program: String,
    pub language: String,
}

impl Default for Cloc {
    fn default() -> Self {
        Cloc { program: "cloc".to_string(), language: "Python".to_string() }
    }
}

impl LineCounter for Cloc {
    fn count(&self, path: &Path) -> Result<Option<LineCounts>> {
        let output = Command::new(&self.program)
            .arg("--json")
            .arg(path)
            .output()
            .map_err(|e| TrendError::tool(&self.program, format!("cannot start: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TrendError::tool(&self.program, stderr.trim().to_string()));
        }
        parse_cloc_json(&String::from_utf8_lossy(&output.stdout), &self.language)
    }
}

/// Pulls one language entry (`nFiles`, `blank`, `comment`, `code`) out of `cloc --json` output.
pub fn parse_cloc_json(text: &str, language: &str) -> Result<Option<LineCounts>> {
    // cloc prints nothing at all when it finds no source files.
    if text.trim().is_empty() {
        return Ok(None);
    }
    let doc: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| TrendError::tool("cloc", format!("unreadable JSON: {e}")))?;
    let Some(entry) = doc.get(language) else {
        return Ok(None);
    };
    let field = |key: &str| entry.get(key).and_then(|v| v.as_i64()).unwrap_or(0);
    Ok(Some(LineCounts {
        files: field("nFiles"),
        blank: field("blank"),
        comment: field("comment"),
        code: field("code"),
    }))
}

/// Line-count fields to merge into a record. Failures only cost the optional columns.
pub fn line_count_fields(counter: &dyn LineCounter, path: &Path) -> Vec<(String, Scalar)> {
    match counter.count(path) {
        Ok(Some(counts)) => counts.into_fields(),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!(error = %e, path = %path.display(), "line counting failed; skipping line columns");
            Vec::new()
        }
    }
}
