use crate::runner::aggregate::{by_name, by_operation, AggregateStats};
use crate::runner::task::{Operation, TaskResult};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Parameters a load run was started with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadConfiguration {
    pub host: String,
    pub users: usize,
    pub spawn_rate: f64,
    pub run_time_seconds: u64,
    pub wait_time_min: f64,
    pub wait_time_max: f64,
}

/// Statistics for one request name
#[derive(Debug, Clone)]
pub struct RequestRow {
    pub name: String,
    pub operation: Operation,
    pub stats: AggregateStats,
}

/// Distinct failure reason for one request name
#[derive(Debug, Clone, PartialEq)]
pub struct FailureRow {
    pub method: String,
    pub name: String,
    pub error: String,
    pub occurrences: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdViolation {
    pub operation: Operation,
    pub message: String,
}

/// Everything a finished load run produced
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub started_at: DateTime<Local>,
    pub configuration: LoadConfiguration,
    /// Wall-clock seconds the run lasted
    pub elapsed: f64,
    pub stopped_early: bool,
    pub operations: BTreeMap<Operation, AggregateStats>,
    pub requests: Vec<RequestRow>,
    pub aggregated: AggregateStats,
    pub failures: Vec<FailureRow>,
    pub violations: Vec<ThresholdViolation>,
}

/// Upper bounds a run is checked against
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub max_response_time_ms: u64,
    pub success_rate: f64,
}

impl LoadReport {
    pub fn build(
        configuration: LoadConfiguration,
        started_at: DateTime<Local>,
        elapsed: f64,
        results: &[TaskResult],
        thresholds: Thresholds,
    ) -> Self {
        let operations = by_operation(results);

        let mut operation_of: HashMap<&str, Operation> = HashMap::new();
        for result in results {
            operation_of.insert(result.name.as_str(), result.operation);
        }
        let requests = by_name(results)
            .into_iter()
            .map(|(name, stats)| RequestRow {
                operation: operation_of
                    .get(name.as_str())
                    .copied()
                    .unwrap_or(Operation::Registration),
                name,
                stats,
            })
            .collect();

        let violations = evaluate_thresholds(&operations, thresholds);

        Self {
            started_at,
            configuration,
            elapsed,
            stopped_early: false,
            aggregated: AggregateStats::from_results(results),
            operations,
            requests,
            failures: failure_rows(results),
            violations,
        }
    }

    /// Stats for `operation`, empty if it never ran
    pub fn operation(&self, operation: Operation) -> AggregateStats {
        self.operations.get(&operation).cloned().unwrap_or_default()
    }

    pub fn requests_per_second(&self, stats: &AggregateStats) -> f64 {
        if self.elapsed > 0.0 {
            stats.total() as f64 / self.elapsed
        } else {
            0.0
        }
    }
}

/// Slowest response and success rate per operation
pub fn evaluate_thresholds(
    operations: &BTreeMap<Operation, AggregateStats>,
    thresholds: Thresholds,
) -> Vec<ThresholdViolation> {
    let mut violations = Vec::new();
    for (operation, stats) in operations {
        if let Some(maximum) = stats.maximum {
            if maximum * 1000.0 > thresholds.max_response_time_ms as f64 {
                violations.push(ThresholdViolation {
                    operation: *operation,
                    message: format!(
                        "maximum response time {:.3}s exceeds {}ms",
                        maximum, thresholds.max_response_time_ms
                    ),
                });
            }
        }
        if let Some(rate) = stats.success_ratio() {
            if rate < thresholds.success_rate {
                violations.push(ThresholdViolation {
                    operation: *operation,
                    message: format!(
                        "success rate {:.2}% is below {}%",
                        rate, thresholds.success_rate
                    ),
                });
            }
        }
    }
    violations
}

fn failure_rows(results: &[TaskResult]) -> Vec<FailureRow> {
    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for result in results {
        if let Some(reason) = result.outcome.reason() {
            *counts.entry((result.name.as_str(), reason)).or_default() += 1;
        }
    }

    let mut rows: Vec<FailureRow> = counts
        .into_iter()
        .map(|((name, error), occurrences)| FailureRow {
            method: "POST".to_string(),
            name: name.to_string(),
            error: error.to_string(),
            occurrences,
        })
        .collect();
    rows.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::task::{TaskOutcome, UserRecord};
    use std::time::Duration;

    fn result(name: &str, operation: Operation, outcome: TaskOutcome, millis: u64) -> TaskResult {
        TaskResult {
            task_id: 0,
            name: name.to_string(),
            operation,
            input: UserRecord::credentials("a@b.com", "pw"),
            outcome,
            duration: Duration::from_millis(millis),
        }
    }

    fn ok() -> TaskOutcome {
        TaskOutcome::Success(serde_json::Value::Null)
    }

    fn configuration() -> LoadConfiguration {
        LoadConfiguration {
            host: "http://127.0.0.1:5000".to_string(),
            users: 2,
            spawn_rate: 1.0,
            run_time_seconds: 10,
            wait_time_min: 1.0,
            wait_time_max: 3.0,
        }
    }

    const THRESHOLDS: Thresholds = Thresholds {
        max_response_time_ms: 2000,
        success_rate: 95.0,
    };

    #[test]
    fn test_report_groups_and_failures() {
        let denied = || TaskOutcome::Failure("Login failed: Invalid Password".to_string());
        let results = vec![
            result("registration_valid", Operation::Registration, ok(), 100),
            result("login_valid", Operation::Login, ok(), 50),
            result("login_valid", Operation::Login, denied(), 70),
            result("login_valid", Operation::Login, denied(), 60),
            result(
                "login_invalid",
                Operation::Login,
                TaskOutcome::Exception("transport error: refused".to_string()),
                10,
            ),
        ];

        let report = LoadReport::build(configuration(), Local::now(), 10.0, &results, THRESHOLDS);

        assert_eq!(report.aggregated.total(), 5);
        assert_eq!(report.operation(Operation::Login).failed, 3);
        assert_eq!(report.operation(Operation::Registration).successful, 1);
        assert_eq!(report.requests.len(), 3);
        assert!((report.requests_per_second(&report.aggregated) - 0.5).abs() < 1e-9);

        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].name, "login_valid");
        assert_eq!(report.failures[0].occurrences, 2);

        // Login succeeded 1 of 4 times
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].operation, Operation::Login);
    }

    #[test]
    fn test_slow_operation_is_flagged() {
        let mut operations = BTreeMap::new();
        operations.insert(
            Operation::Registration,
            AggregateStats::from_results(&[result(
                "registration_valid",
                Operation::Registration,
                ok(),
                2500,
            )]),
        );
        let violations = evaluate_thresholds(&operations, THRESHOLDS);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("2.500s"));
    }

    #[test]
    fn test_empty_run() {
        let report = LoadReport::build(configuration(), Local::now(), 0.0, &[], THRESHOLDS);
        assert!(report.violations.is_empty());
        assert!(report.failures.is_empty());
        assert_eq!(report.operation(Operation::Login).success_rate(), "0%");
        assert_eq!(report.requests_per_second(&report.aggregated), 0.0);
    }
}
