use crate::error::{Result, TrendError};
use crate::ledger::Ledger;
use crate::types::AggregateRecord;
use std::io::Write;
use std::path::Path;

/// Renders records as one CSV table: header of the union of all columns, one row
/// per record, empty cells where a record lacks a column.
pub fn render_csv(records: &[AggregateRecord]) -> Result<String> {
    Ledger::from_records(records).to_csv()
}

/// Outputs the series as CSV. Writes to a file if given, otherwise stdout.
pub fn report_csv(records: &[AggregateRecord], output_file: Option<&Path>) -> Result<()> {
    let text = render_csv(records)?;
    match output_file {
        Some(path) => {
            std::fs::write(path, &text).map_err(|e| TrendError::io(path, e))?;
            eprintln!("✓ CSV series written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(text.as_bytes())
                .and_then(|_| stdout.flush())
                .map_err(|e| TrendError::io("<stdout>", e))?;
        }
    }
    Ok(())
}
