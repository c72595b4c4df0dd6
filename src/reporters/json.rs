use crate::error::{Result, TrendError};
use crate::types::AggregateRecord;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Outputs the series as a JSON array of flat records. Writes to a file if given, otherwise stdout.
pub fn report_json(records: &[AggregateRecord], output_file: Option<&Path>) -> Result<()> {
    if let Some(path) = output_file {
        let file = File::create(path).map_err(|e| TrendError::io(path, e))?;
        write_json(records, BufWriter::new(file)).map_err(|e| TrendError::io(path, e))?;
        eprintln!("✓ JSON series written to {}", path.display());
    } else {
        let stdout = std::io::stdout();
        write_json(records, BufWriter::new(stdout.lock())).map_err(|e| TrendError::io("<stdout>", e))?;
    }
    Ok(())
}

fn write_json<W: Write>(records: &[AggregateRecord], mut writer: W) -> std::io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n")?;
    writer.flush()
}
