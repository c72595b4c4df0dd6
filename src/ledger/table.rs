use crate::error::{Result, TrendError};
use crate::types::AggregateRecord;

/// Append-only metrics table as stored in the ledger CSV.
///
/// Cells are kept as text exactly as read, so rows written by earlier runs
/// survive a round trip unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Ledger {
    /// Parses ledger CSV. Blank input is an empty ledger; short rows are padded.
    pub fn from_csv(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Ledger::default());
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(columns.len(), String::new());
            rows.push(row);
        }
        Ok(Ledger { columns, rows })
    }

    pub fn from_records<'r, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'r AggregateRecord>,
    {
        let mut ledger = Ledger::default();
        for record in records {
            ledger.append(record);
        }
        ledger
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Adds one row for `record`. Columns the ledger has not seen are appended
    /// in the record's order and existing rows get empty cells for them.
    pub fn append(&mut self, record: &AggregateRecord) {
        for column in record.columns() {
            if !self.columns.contains(&column) {
                self.columns.push(column);
                for row in &mut self.rows {
                    row.push(String::new());
                }
            }
        }
        let row = self
            .columns
            .iter()
            .map(|c| record.cell(c).unwrap_or_default())
            .collect();
        self.rows.push(row);
    }

    /// Serializes the whole table with a header row. An empty table with no
    /// columns serializes to an empty string.
    pub fn to_csv(&self) -> Result<String> {
        if self.columns.is_empty() {
            return Ok(String::new());
        }
        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| TrendError::io("ledger buffer", e.into_error()))?;
        String::from_utf8(bytes)
            .map_err(|e| TrendError::RemoteStore(format!("ledger is not valid UTF-8: {e}")))
    }
}
