use super::stats::{self, round_to};
use crate::error::{Result, TrendError};
use crate::types::{AggregateRecord, Metrics, MetricsRow, Scalar};
use chrono::NaiveDate;

/// Count metrics summarized as mean / max / 90th percentile.
const COUNT_METRICS: &[(&str, fn(&Metrics) -> Option<f64>)] = &[
    ("lines", |m| m.lines),
    ("statements", |m| m.statements),
    ("expressions", |m| m.expressions),
    ("cyclomatic_complexity", |m| m.cyclomatic_complexity),
    ("parameters", |m| m.parameters),
];

/// Rows that carry metrics. Directories and other structural nodes drop out here,
/// before any zero-filling.
pub fn metric_rows(rows: &[MetricsRow]) -> Vec<&MetricsRow> {
    rows.iter().filter(|r| r.has_metrics).collect()
}

/// Summarizes one snapshot's rows into an [`AggregateRecord`] dated `date`.
///
/// Structural rows are ignored; remaining missing values count as zero.
/// Fails with [`TrendError::EmptyMetrics`] when nothing carries metrics.
pub fn aggregate(rows: &[MetricsRow], date: NaiveDate) -> Result<AggregateRecord> {
    let rows = metric_rows(rows);
    if rows.is_empty() {
        return Err(TrendError::EmptyMetrics);
    }

    let mut record = AggregateRecord::new(date);
    let n = rows.len() as f64;

    let documented = rows
        .iter()
        .filter(|r| r.docstring.as_deref().is_some_and(|d| !d.is_empty()))
        .count();
    let undocumented = rows.iter().filter(|r| r.docstring.as_deref() == Some("")).count();
    record.insert("docstring coverage", Scalar::Float(round_to(documented as f64 / n, 4)));
    record.insert("docstring missing", Scalar::Int(undocumented as i64));

    for (name, get) in COUNT_METRICS {
        let values = counts(&rows, *get);
        record.insert(format!("{name} mean"), Scalar::Float(round_to(require(stats::mean(&values))?, 4)));
        record.insert(format!("{name} max"), Scalar::Int(require(stats::max(&values))? as i64));
        record.insert(
            format!("{name} 90th-percentile"),
            Scalar::Int(require(stats::quantile(&values, 0.9))?.trunc() as i64),
        );
    }

    let coverage = scores(&rows, |m| m.type_coverage);
    record.insert("type_coverage mean", Scalar::Float(round_to(require(stats::mean(&coverage))?, 4)));
    // Whole percentages, matching ledgers written by earlier tooling.
    record.insert("type_coverage min", Scalar::Int(require(stats::min(&coverage))?.trunc() as i64));
    record.insert(
        "type_coverage 50th-percentile",
        Scalar::Int(require(stats::quantile(&coverage, 0.5))?.trunc() as i64),
    );

    let todos: f64 = counts(&rows, |m| m.todo_comments).iter().sum();
    record.insert("todo_comments total", Scalar::Int(todos as i64));

    let dup = scores(&rows, |m| m.duplication.as_ref().and_then(|d| d.score));
    record.insert("duplication.score mean", Scalar::Float(require(stats::mean(&dup))?));
    record.insert("duplication.score max", Scalar::Float(require(stats::max(&dup))?));
    record.insert(
        "duplication.score 90th-percentile",
        Scalar::Float(require(stats::quantile(&dup, 0.9))?),
    );
    record.insert(
        "duplication.score 50th-percentile",
        Scalar::Float(require(stats::quantile(&dup, 0.5))?),
    );

    let lines = counts(&rows, |m| m.lines);
    let duplicated: f64 = lines.iter().zip(&dup).map(|(l, s)| l * s).sum();
    record.insert(
        "duplication.duplicated-lines total",
        Scalar::Int(duplicated.round_ties_even() as i64),
    );

    Ok(record)
}

/// Zero-filled, integer-truncated values of a count metric.
fn counts(rows: &[&MetricsRow], get: fn(&Metrics) -> Option<f64>) -> Vec<f64> {
    rows.iter().map(|r| get(&r.metrics).unwrap_or(0.0).trunc()).collect()
}

/// Zero-filled values of a score metric.
fn scores(rows: &[&MetricsRow], get: fn(&Metrics) -> Option<f64>) -> Vec<f64> {
    rows.iter().map(|r| get(&r.metrics).unwrap_or(0.0)).collect()
}

fn require(value: Option<f64>) -> Result<f64> {
    value.ok_or(TrendError::EmptyMetrics)
}
