use super::events::TestEvent;
use crate::report::types::{FeatureNode, RunReport, RunSummary, ScenarioNode, Status, StepNode};
use chrono::{DateTime, Local};
use std::time::Instant;

/// Builds the feature/scenario/step tree from execution events.
///
/// Events arrive in order (feature, scenario, steps, scenario end, feature
/// end). Parent status is derived from the steps when a node closes, so the
/// tree never disagrees with its leaves.
pub struct ReportBuilder {
    session_id: String,
    started_at: DateTime<Local>,
    started: Instant,
    features: Vec<FeatureNode>,
    feature: Option<FeatureNode>,
    scenario: Option<ScenarioNode>,
}

impl ReportBuilder {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            started_at: Local::now(),
            started: Instant::now(),
            features: Vec::new(),
            feature: None,
            scenario: None,
        }
    }

    pub fn on_event(&mut self, event: &TestEvent) {
        match event {
            TestEvent::FeatureStarted { name, tags, .. } => {
                self.close_feature(None);
                self.feature = Some(FeatureNode {
                    name: name.clone(),
                    tags: tags.clone(),
                    scenarios: Vec::new(),
                    status: Status::Passed,
                    duration: 0.0,
                });
            }
            TestEvent::FeatureFinished { duration, .. } => self.close_feature(Some(*duration)),

            TestEvent::ScenarioStarted { name, tags, .. } => {
                self.close_scenario(None);
                self.scenario = Some(ScenarioNode {
                    name: name.clone(),
                    tags: tags.clone(),
                    steps: Vec::new(),
                    status: Status::Passed,
                    duration: 0.0,
                });
            }
            TestEvent::ScenarioFinished { duration, .. } => self.close_scenario(Some(*duration)),

            TestEvent::StepStarted { keyword, text, .. } => {
                if let Some(scenario) = self.scenario.as_mut() {
                    scenario.steps.push(StepNode {
                        keyword: keyword.clone(),
                        name: text.clone(),
                        // Stays skipped unless a result arrives
                        status: Status::Skipped,
                        duration: 0.0,
                        error_message: None,
                    });
                }
            }
            TestEvent::StepPassed { duration, .. } => {
                if let Some(step) = self.last_step() {
                    step.status = Status::Passed;
                    step.duration = *duration;
                }
            }
            TestEvent::StepFailed {
                error, duration, ..
            } => {
                if let Some(step) = self.last_step() {
                    step.status = Status::Failed;
                    step.duration = *duration;
                    step.error_message = Some(error.clone());
                }
            }
            TestEvent::StepSkipped { keyword, text, .. } => {
                if let Some(scenario) = self.scenario.as_mut() {
                    scenario.steps.push(StepNode {
                        keyword: keyword.clone(),
                        name: text.clone(),
                        status: Status::Skipped,
                        duration: 0.0,
                        error_message: None,
                    });
                }
            }

            TestEvent::RunStarted { .. } | TestEvent::RunFinished { .. } | TestEvent::Log { .. } => {}
        }
    }

    /// Summary of everything recorded so far
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_features(&self.features, self.started.elapsed().as_secs_f64())
    }

    /// Close any open nodes and produce the final report
    pub fn finish(mut self) -> RunReport {
        self.close_feature(None);
        let summary = self.summary();
        RunReport {
            session_id: self.session_id,
            started_at: self.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            finished_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            features: self.features,
            summary,
        }
    }

    fn last_step(&mut self) -> Option<&mut StepNode> {
        self.scenario.as_mut().and_then(|s| s.steps.last_mut())
    }

    fn close_scenario(&mut self, duration: Option<f64>) {
        let Some(mut scenario) = self.scenario.take() else {
            return;
        };
        scenario.status = Status::rollup(scenario.steps.iter().map(|s| s.status));
        scenario.duration = duration.unwrap_or_else(|| scenario.steps.iter().map(|s| s.duration).sum());

        match self.feature.as_mut() {
            Some(feature) => feature.scenarios.push(scenario),
            None => log::warn!("scenario '{}' finished outside a feature", scenario.name),
        }
    }

    fn close_feature(&mut self, duration: Option<f64>) {
        self.close_scenario(None);
        let Some(mut feature) = self.feature.take() else {
            return;
        };
        feature.status = Status::rollup(feature.scenarios.iter().map(|s| s.status));
        feature.duration =
            duration.unwrap_or_else(|| feature.scenarios.iter().map(|s| s.duration).sum());
        self.features.push(feature);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(index: usize, text: &str) -> TestEvent {
        TestEvent::StepStarted {
            index,
            keyword: "Then".to_string(),
            text: text.to_string(),
        }
    }

    fn scenario(name: &str) -> TestEvent {
        TestEvent::ScenarioStarted {
            name: name.to_string(),
            tags: vec![],
            step_count: 2,
        }
    }

    #[test]
    fn test_failed_step_propagates_upward() {
        let mut builder = ReportBuilder::new("s1");
        let events = vec![
            TestEvent::FeatureStarted {
                name: "Login".to_string(),
                tags: vec!["login".to_string()],
                scenario_count: 2,
            },
            scenario("good"),
            step(0, "a"),
            TestEvent::StepPassed { index: 0, duration: 0.5 },
            step(1, "b"),
            TestEvent::StepPassed { index: 1, duration: 0.25 },
            TestEvent::ScenarioFinished {
                name: "good".to_string(),
                status: Status::Passed,
                duration: 0.75,
            },
            scenario("bad"),
            step(0, "a"),
            TestEvent::StepFailed {
                index: 0,
                error: "No token in response".to_string(),
                duration: 0.1,
            },
            TestEvent::StepSkipped {
                index: 1,
                keyword: "And".to_string(),
                text: "b".to_string(),
            },
            TestEvent::ScenarioFinished {
                name: "bad".to_string(),
                // The builder derives status from steps, not from the event
                status: Status::Passed,
                duration: 0.1,
            },
        ];
        for event in &events {
            builder.on_event(event);
        }
        let report = builder.finish();

        let feature = &report.features[0];
        assert_eq!(feature.status, Status::Failed);
        assert_eq!(feature.scenarios[0].status, Status::Passed);
        assert_eq!(feature.scenarios[1].status, Status::Failed);
        assert_eq!(feature.scenarios[1].error(), Some("No token in response"));
        assert_eq!(feature.scenarios[1].steps[1].status, Status::Skipped);

        assert_eq!(report.summary.total_scenarios, 2);
        assert_eq!(report.summary.passed, 1);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.skipped_steps, 1);
        assert!(!report.passed());
    }

    #[test]
    fn test_unclosed_nodes_are_finalized() {
        let mut builder = ReportBuilder::new("s2");
        builder.on_event(&TestEvent::FeatureStarted {
            name: "Registration".to_string(),
            tags: vec![],
            scenario_count: 1,
        });
        builder.on_event(&scenario("dangling"));
        builder.on_event(&step(0, "never finished"));

        let report = builder.finish();
        let scenario = &report.features[0].scenarios[0];
        assert_eq!(scenario.steps[0].status, Status::Skipped);
        assert_eq!(scenario.status, Status::Passed);
        assert!(report.passed());
    }
}
