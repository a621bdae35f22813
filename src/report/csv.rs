//! Locust-compatible CSV statistics for load runs

use crate::error::{HarnessError, HarnessResult};
use crate::load::stats::LoadReport;
use crate::runner::aggregate::AggregateStats;
use std::path::{Path, PathBuf};

const STATS_HEADER: [&str; 10] = [
    "Type",
    "Name",
    "Request Count",
    "Failure Count",
    "Median",
    "Average",
    "Min",
    "Max",
    "95%",
    "Requests/s",
];

const FAILURES_HEADER: [&str; 4] = ["Method", "Name", "Error", "Occurrences"];

/// `<prefix><suffix>`, e.g. `out/run` + `_stats.csv`
pub fn suffixed(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// One row per request name plus an `Aggregated` row. Times are milliseconds.
pub fn stats_csv(report: &LoadReport) -> HarnessResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(STATS_HEADER).map_err(HarnessError::encode)?;

    for row in &report.requests {
        writer
            .write_record(stats_record("POST", &row.name, &row.stats, report))
            .map_err(HarnessError::encode)?;
    }
    writer
        .write_record(stats_record("", "Aggregated", &report.aggregated, report))
        .map_err(HarnessError::encode)?;

    finish(writer)
}

pub fn failures_csv(report: &LoadReport) -> HarnessResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(FAILURES_HEADER).map_err(HarnessError::encode)?;

    for failure in &report.failures {
        let occurrences = failure.occurrences.to_string();
        writer
            .write_record([
                failure.method.as_str(),
                failure.name.as_str(),
                failure.error.as_str(),
                occurrences.as_str(),
            ])
            .map_err(HarnessError::encode)?;
    }

    finish(writer)
}

fn stats_record(kind: &str, name: &str, stats: &AggregateStats, report: &LoadReport) -> Vec<String> {
    let millis = |secs: Option<f64>| format!("{:.0}", secs.unwrap_or(0.0) * 1000.0);
    vec![
        kind.to_string(),
        name.to_string(),
        stats.total().to_string(),
        stats.failed.to_string(),
        millis(stats.percentile(50.0)),
        format!("{:.2}", stats.average * 1000.0),
        millis(stats.minimum()),
        millis(stats.maximum),
        millis(stats.percentile(95.0)),
        format!("{:.2}", report.requests_per_second(stats)),
    ]
}

fn finish(writer: csv::Writer<Vec<u8>>) -> HarnessResult<String> {
    let bytes = writer.into_inner().map_err(HarnessError::encode)?;
    String::from_utf8(bytes).map_err(HarnessError::encode)
}
