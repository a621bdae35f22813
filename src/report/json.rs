use super::types::RunReport;
use crate::error::{HarnessError, HarnessResult};
use crate::load::stats::LoadReport;
use crate::runner::task::Operation;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

pub fn render_run(report: &RunReport) -> HarnessResult<String> {
    serde_json::to_string_pretty(report).map_err(HarnessError::encode)
}

/// Read back a results.json written by a functional run
pub fn load_run(path: &Path) -> HarnessResult<RunReport> {
    let content = std::fs::read_to_string(path).map_err(|e| HarnessError::report_io(path, e))?;
    serde_json::from_str(&content).map_err(|e| {
        HarnessError::Config(format!("invalid results file {}: {}", path.display(), e))
    })
}

#[derive(Debug, Serialize)]
struct LoadJson<'a> {
    timestamp: String,
    test_configuration: TestConfiguration<'a>,
    #[serde(flatten)]
    results: BTreeMap<String, OperationJson>,
    threshold_violations: Vec<String>,
    stopped_early: bool,
}

#[derive(Debug, Serialize)]
struct TestConfiguration<'a> {
    host: &'a str,
    concurrent_users: usize,
    spawn_rate: f64,
    run_time_seconds: u64,
    wait_time_seconds: [f64; 2],
}

#[derive(Debug, Serialize)]
struct OperationJson {
    successful: usize,
    failed: usize,
    average_response_time: String,
    success_rate: String,
}

/// `load_test_report_<YYYYmmdd_HHMMSS>.json`
pub fn load_report_file_name(report: &LoadReport) -> String {
    format!(
        "load_test_report_{}.json",
        report.started_at.format("%Y%m%d_%H%M%S")
    )
}

/// Per-operation summary of a load run, with both operations always present
pub fn render_load(report: &LoadReport) -> HarnessResult<String> {
    let config = &report.configuration;

    let results = [Operation::Registration, Operation::Login]
        .into_iter()
        .map(|operation| {
            let stats = report.operation(operation);
            (
                format!("{}_results", operation.as_str()),
                OperationJson {
                    successful: stats.successful,
                    failed: stats.failed,
                    average_response_time: format!("{:.3} seconds", stats.average),
                    success_rate: stats.success_rate(),
                },
            )
        })
        .collect();

    let document = LoadJson {
        timestamp: report.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        test_configuration: TestConfiguration {
            host: &config.host,
            concurrent_users: config.users,
            spawn_rate: config.spawn_rate,
            run_time_seconds: config.run_time_seconds,
            wait_time_seconds: [config.wait_time_min, config.wait_time_max],
        },
        results,
        threshold_violations: report
            .violations
            .iter()
            .map(|v| format!("{}: {}", v.operation.as_str(), v.message))
            .collect(),
        stopped_early: report.stopped_early,
    };

    serde_json::to_string_pretty(&document).map_err(HarnessError::encode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::stats::{LoadConfiguration, Thresholds};
    use crate::runner::task::{TaskOutcome, TaskResult, UserRecord};
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_load_report_document() {
        let started_at = chrono::Local
            .with_ymd_and_hms(2024, 3, 1, 9, 5, 7)
            .single()
            .unwrap();
        let results = vec![TaskResult {
            task_id: 0,
            name: "login_valid".to_string(),
            operation: Operation::Login,
            input: UserRecord::credentials("a@b.com", "pw"),
            outcome: TaskOutcome::Success(serde_json::Value::Null),
            duration: Duration::from_millis(1500),
        }];
        let report = LoadReport::build(
            LoadConfiguration {
                host: "http://127.0.0.1:5000".to_string(),
                users: 10,
                spawn_rate: 1.0,
                run_time_seconds: 60,
                wait_time_min: 1.0,
                wait_time_max: 3.0,
            },
            started_at,
            60.0,
            &results,
            Thresholds {
                max_response_time_ms: 2000,
                success_rate: 95.0,
            },
        );

        assert_eq!(
            load_report_file_name(&report),
            "load_test_report_20240301_090507.json"
        );

        let value: serde_json::Value =
            serde_json::from_str(&render_load(&report).unwrap()).unwrap();
        assert_eq!(value["timestamp"], "2024-03-01 09:05:07");
        assert_eq!(value["test_configuration"]["concurrent_users"], 10);
        assert_eq!(value["login_results"]["successful"], 1);
        assert_eq!(
            value["login_results"]["average_response_time"],
            "1.500 seconds"
        );
        assert_eq!(value["login_results"]["success_rate"], "100.00%");
        assert_eq!(value["registration_results"]["success_rate"], "0%");
        assert_eq!(value["threshold_violations"].as_array().unwrap().len(), 0);
    }
}
