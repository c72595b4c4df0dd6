use crate::types::{AggregateRecord, Scalar};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, Table};

/// Which way a metric should move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Better {
    Higher,
    Lower,
    Neither,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Up,
    Down,
    Flat,
    Unknown,
}

/// Columns shown in the trend table: (record field, header, preferred direction).
const HEADLINE: &[(&str, &str, Better)] = &[
    ("docstring coverage", "DOC COV", Better::Higher),
    ("type_coverage mean", "TYPE COV", Better::Higher),
    ("cyclomatic_complexity mean", "CC MEAN", Better::Lower),
    ("cyclomatic_complexity max", "CC MAX", Better::Lower),
    ("duplication.score mean", "DUP MEAN", Better::Lower),
    ("todo_comments total", "TODOS", Better::Lower),
    ("lines code", "CODE LINES", Better::Neither),
];

pub fn report_terminal(records: &[AggregateRecord]) {
    eprintln!();
    println!(
        "{} {}",
        "📈 quality-trend".cyan().bold(),
        format!("({} snapshot{})", records.len(), if records.len() != 1 { "s" } else { "" }).bright_black(),
    );
    println!();

    if records.is_empty() {
        println!("{}", "  No snapshots with metrics were found.".yellow());
        println!();
        return;
    }

    println!("{}", build_table(records));

    if let (Some(first), Some(last)) = (records.first(), records.last()) {
        if records.len() > 1 {
            println!();
            println!("{}", format!("Change {} → {}:", first.date, last.date).cyan());
            for line in summary_lines(first, last) {
                println!("    {} {}", "•".white(), line);
            }
        }
    }
    println!();
}

pub(crate) fn build_table(records: &[AggregateRecord]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    let mut header = vec!["DATE"];
    header.extend(HEADLINE.iter().map(|(_, h, _)| *h));
    table.set_header(header);

    let mut previous: Option<&AggregateRecord> = None;
    for record in records {
        let mut row = vec![Cell::new(record.date.to_string())];
        for (field, _, better) in HEADLINE {
            let current = value(record, field);
            let before = previous.and_then(|p| value(p, field));
            row.push(metric_cell(record, field, trend(before, current), *better));
        }
        table.add_row(row);
        previous = Some(record);
    }
    table
}

// ─── Cell builders ────────────────────────────────────────────────────────────

/// Value text plus an arrow; color comes from whether the move is an improvement.
/// Plain text keeps comfy-table's width measurement exact.
fn metric_cell(record: &AggregateRecord, field: &str, trend: Trend, better: Better) -> Cell {
    let Some(text) = record.cell(field) else {
        return Cell::new("-").fg(Color::DarkGrey);
    };
    let arrow = match trend {
        Trend::Up => "▲",
        Trend::Down => "▼",
        Trend::Flat => "=",
        Trend::Unknown => " ",
    };
    let cell = Cell::new(format!("{text} {arrow}"));
    match (trend, better) {
        (Trend::Up, Better::Higher) | (Trend::Down, Better::Lower) => cell.fg(Color::Green),
        (Trend::Up, Better::Lower) | (Trend::Down, Better::Higher) => {
            cell.fg(Color::Red).add_attribute(Attribute::Bold)
        }
        _ => cell,
    }
}

// ─── Other helpers ────────────────────────────────────────────────────────────

fn value(record: &AggregateRecord, field: &str) -> Option<f64> {
    record.get(field).map(Scalar::as_f64)
}

fn trend(before: Option<f64>, after: Option<f64>) -> Trend {
    match (before, after) {
        (Some(b), Some(a)) if a > b => Trend::Up,
        (Some(b), Some(a)) if a < b => Trend::Down,
        (Some(_), Some(_)) => Trend::Flat,
        _ => Trend::Unknown,
    }
}

fn summary_lines(first: &AggregateRecord, last: &AggregateRecord) -> Vec<String> {
    let mut lines = Vec::new();
    for (field, _, better) in HEADLINE {
        let (Some(a), Some(b)) = (value(first, field), value(last, field)) else {
            continue;
        };
        let delta = b - a;
        let text = format!("{field}: {a} → {b} ({delta:+.4})");
        let line = match (trend(Some(a), Some(b)), better) {
            (Trend::Up, Better::Higher) | (Trend::Down, Better::Lower) => text.green().to_string(),
            (Trend::Up, Better::Lower) | (Trend::Down, Better::Higher) => text.red().to_string(),
            _ => text,
        };
        lines.push(line);
    }
    lines
}
