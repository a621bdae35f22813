use serde::{Deserialize, Serialize};

/// Status of a step, scenario or feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
    Skipped,
}

impl Status {
    /// A parent fails iff any child failed
    pub fn rollup(children: impl IntoIterator<Item = Status>) -> Status {
        if children.into_iter().any(|s| s == Status::Failed) {
            Status::Failed
        } else {
            Status::Passed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Passed => "passed",
            Status::Failed => "failed",
            Status::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepNode {
    pub keyword: String,
    pub name: String,
    pub status: Status,
    /// Seconds
    pub duration: f64,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioNode {
    pub name: String,
    pub tags: Vec<String>,
    pub steps: Vec<StepNode>,
    pub status: Status,
    pub duration: f64,
}

impl ScenarioNode {
    pub fn error(&self) -> Option<&str> {
        self.steps.iter().find_map(|s| s.error_message.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureNode {
    pub name: String,
    pub tags: Vec<String>,
    pub scenarios: Vec<ScenarioNode>,
    pub status: Status,
    pub duration: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_features: usize,
    pub total_scenarios: usize,
    pub passed: usize,
    pub failed: usize,
    pub total_steps: usize,
    pub failed_steps: usize,
    pub skipped_steps: usize,
    /// Wall-clock seconds
    pub duration: f64,
}

impl RunSummary {
    pub fn from_features(features: &[FeatureNode], duration: f64) -> Self {
        let mut summary = RunSummary {
            total_features: features.len(),
            duration,
            ..Default::default()
        };
        for scenario in features.iter().flat_map(|f| &f.scenarios) {
            summary.total_scenarios += 1;
            match scenario.status {
                Status::Failed => summary.failed += 1,
                _ => summary.passed += 1,
            }
            for step in &scenario.steps {
                summary.total_steps += 1;
                match step.status {
                    Status::Failed => summary.failed_steps += 1,
                    Status::Skipped => summary.skipped_steps += 1,
                    Status::Passed => {}
                }
            }
        }
        summary
    }
}

/// Finalized result of one functional run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub session_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub features: Vec<FeatureNode>,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.summary.failed == 0
    }
}
