use super::task::{Operation, TaskResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counts and timings for one batch of results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub successful: usize,
    pub failed: usize,
    /// Durations in seconds, in completion order
    pub times: Vec<f64>,
    pub average: f64,
    pub maximum: Option<f64>,
}

impl AggregateStats {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a TaskResult>) -> Self {
        let mut successful = 0;
        let mut total = 0;
        let mut times = Vec::new();

        for result in results {
            total += 1;
            if result.outcome.is_success() {
                successful += 1;
            }
            times.push(result.duration.as_secs_f64());
        }

        let average = if times.is_empty() {
            0.0
        } else {
            times.iter().sum::<f64>() / times.len() as f64
        };
        let maximum = times.iter().copied().reduce(f64::max);

        Self {
            successful,
            failed: total - successful,
            times,
            average,
            maximum,
        }
    }

    pub fn total(&self) -> usize {
        self.successful + self.failed
    }

    /// Success percentage; `None` for an empty batch
    pub fn success_ratio(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            None
        } else {
            Some(self.successful as f64 / total as f64 * 100.0)
        }
    }

    /// Success rate with two decimals, or "0%" when nothing ran
    pub fn success_rate(&self) -> String {
        match self.success_ratio() {
            Some(rate) => format!("{:.2}%", rate),
            None => "0%".to_string(),
        }
    }

    pub fn minimum(&self) -> Option<f64> {
        self.times.iter().copied().reduce(f64::min)
    }

    /// Nearest-rank percentile of the recorded durations
    pub fn percentile(&self, pct: f64) -> Option<f64> {
        if self.times.is_empty() {
            return None;
        }
        let mut sorted = self.times.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
        Some(sorted[rank.clamp(1, sorted.len()) - 1])
    }
}

/// Group results by operation family
pub fn by_operation(results: &[TaskResult]) -> BTreeMap<Operation, AggregateStats> {
    let mut groups: BTreeMap<Operation, Vec<&TaskResult>> = BTreeMap::new();
    for result in results {
        groups.entry(result.operation).or_default().push(result);
    }
    groups
        .into_iter()
        .map(|(op, group)| (op, AggregateStats::from_results(group)))
        .collect()
}

/// Group results by request name
pub fn by_name(results: &[TaskResult]) -> BTreeMap<String, AggregateStats> {
    let mut groups: BTreeMap<&str, Vec<&TaskResult>> = BTreeMap::new();
    for result in results {
        groups.entry(result.name.as_str()).or_default().push(result);
    }
    groups
        .into_iter()
        .map(|(name, group)| (name.to_string(), AggregateStats::from_results(group)))
        .collect()
}
