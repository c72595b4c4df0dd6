use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

// ─── Report Metrics ───────────────────────────────────────────────────────────

/// Typed view of a report node's `metrics` object.
/// Every field is optional; unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Metrics {
    pub lines: Option<f64>,
    pub statements: Option<f64>,
    pub expressions: Option<f64>,
    pub expression_statements: Option<f64>,
    pub cyclomatic_complexity: Option<f64>,
    pub parameters: Option<f64>,
    pub type_coverage: Option<f64>,
    pub todo_comments: Option<f64>,
    pub duplication: Option<Duplication>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Duplication {
    pub score: Option<f64>,
    /// Free-form pointer to the duplicated counterpart; the scanner's shape varies.
    pub other: Option<serde_json::Value>,
    pub lines_other: Option<f64>,
}

// ─── Flattened Rows ───────────────────────────────────────────────────────────

/// One visited report node, flattened. Emitted for structural nodes too;
/// `has_metrics` tells the aggregator which rows count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsRow {
    pub name: String,
    pub nodetype: String,
    pub path: Option<String>,
    pub qualname: Option<String>,
    pub qual_or_name: String,
    pub lineno: Option<u64>,
    pub end_lineno: Option<u64>,
    pub docstring: Option<String>,
    pub metrics: Metrics,
    pub has_metrics: bool,
    pub is_directory: bool,
    pub is_file: bool,
}

// ─── Aggregate Records ────────────────────────────────────────────────────────

/// A single cell value in an aggregate record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
}

impl Scalar {
    pub fn as_f64(&self) -> f64 {
        match self {
            Scalar::Int(v) => *v as f64,
            Scalar::Float(v) => *v,
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            // Whole floats keep a trailing ".0" so the column still reads as a float.
            Scalar::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 => {
                write!(f, "{v:.1}")
            }
            Scalar::Float(v) => write!(f, "{v}"),
        }
    }
}

pub const DATE_COLUMN: &str = "date";

/// One summarized point in time: an ordered set of named statistics keyed by `date`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRecord {
    pub date: NaiveDate,
    fields: Vec<(String, Scalar)>,
}

impl AggregateRecord {
    pub fn new(date: NaiveDate) -> Self {
        AggregateRecord { date, fields: Vec::new() }
    }

    /// Sets `name`, replacing an existing value in place so column order is kept.
    pub fn insert(&mut self, name: impl Into<String>, value: Scalar) {
        let name = name.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn extend<I>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (String, Scalar)>,
    {
        for (name, value) in fields {
            self.insert(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Statistics without the date, in insertion order.
    pub fn fields(&self) -> &[(String, Scalar)] {
        &self.fields
    }

    /// Column names with `date` first.
    pub fn columns(&self) -> Vec<String> {
        std::iter::once(DATE_COLUMN.to_string())
            .chain(self.fields.iter().map(|(k, _)| k.clone()))
            .collect()
    }

    /// Cell for `column` rendered as ledger text, `None` if the record lacks it.
    pub fn cell(&self, column: &str) -> Option<String> {
        if column == DATE_COLUMN {
            return Some(self.date.format("%Y-%m-%d").to_string());
        }
        self.get(column).map(|v| v.to_string())
    }
}

impl Serialize for AggregateRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(DATE_COLUMN, &self.date.format("%Y-%m-%d").to_string())?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// ─── Git Snapshots ────────────────────────────────────────────────────────────

/// A commit chosen for analysis. Built by the sampler, consumed once by the backfill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSnapshot {
    pub sha: String,
    pub commit_date: DateTime<FixedOffset>,
}

impl CommitSnapshot {
    /// Calendar date of the commit in the committer's own offset.
    pub fn date(&self) -> NaiveDate {
        self.commit_date.date_naive()
    }

    pub fn short_sha(&self) -> &str {
        &self.sha[..self.sha.len().min(10)]
    }
}
