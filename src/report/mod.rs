pub mod csv;
pub mod html;
pub mod json;
pub mod junit;
pub mod types;

use crate::error::{HarnessError, HarnessResult};
use crate::load::stats::LoadReport;
use std::path::{Path, PathBuf};
use types::RunReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Html,
    Json,
    Junit,
}

/// Files written for one functional run
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub results: PathBuf,
    pub html: PathBuf,
    pub junit: PathBuf,
}

/// Write `contents` to `path` in one go, creating parent directories
pub fn write_file(path: &Path, contents: &str) -> HarnessResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| HarnessError::report_io(parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| HarnessError::report_io(path, e))
}

/// Persist a functional run as results.json, report.html and junit.xml
pub fn write_run_reports(report: &RunReport, output_dir: &Path) -> HarnessResult<RunArtifacts> {
    let artifacts = RunArtifacts {
        results: output_dir.join("results.json"),
        html: output_dir.join("report.html"),
        junit: output_dir.join("junit.xml"),
    };

    write_file(&artifacts.results, &json::render_run(report)?)?;
    write_file(&artifacts.html, &html::render_run(report))?;
    write_file(&artifacts.junit, &junit::generate_junit_xml(report)?)?;
    Ok(artifacts)
}

/// Persist a load run: CSV pair, HTML page and the timestamped JSON report
pub fn write_load_reports(
    report: &LoadReport,
    csv_prefix: Option<&Path>,
    html_path: Option<&Path>,
    reports_dir: &Path,
) -> HarnessResult<Vec<PathBuf>> {
    let mut written = Vec::new();

    if let Some(prefix) = csv_prefix {
        let stats_path = csv::suffixed(prefix, "_stats.csv");
        write_file(&stats_path, &csv::stats_csv(report)?)?;
        written.push(stats_path);

        let failures_path = csv::suffixed(prefix, "_failures.csv");
        write_file(&failures_path, &csv::failures_csv(report)?)?;
        written.push(failures_path);
    }

    if let Some(path) = html_path {
        write_file(path, &html::render_load(report))?;
        written.push(path.to_path_buf());
    }

    let json_path = reports_dir.join(json::load_report_file_name(report));
    write_file(&json_path, &json::render_load(report)?)?;
    written.push(json_path);

    Ok(written)
}

/// Re-render a saved results.json. Prints to stdout when `output` is `None`.
pub fn generate_report(
    results_path: &Path,
    format: ReportFormat,
    output: Option<&Path>,
) -> HarnessResult<()> {
    let report = json::load_run(results_path)?;

    let rendered = match format {
        ReportFormat::Html => html::render_run(&report),
        ReportFormat::Json => json::render_run(&report)?,
        ReportFormat::Junit => junit::generate_junit_xml(&report)?,
    };

    match output {
        Some(path) => {
            write_file(path, &rendered)?;
            println!("Report saved to: {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
