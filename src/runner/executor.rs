use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::classifier::Classifier;
use super::context::ScenarioContext;
use super::dispatcher::Dispatcher;
use super::events::{ConsoleEventListener, EventEmitter, TestEvent};
use super::state::ReportBuilder;
use super::task::{Expectation, TaskOutcome, TaskResult, TaskUnit, UserRecord};
use crate::client::{AuthApi, RawResponse};
use crate::error::{HarnessError, HarnessResult};
use crate::parser::types::{
    FeatureFile, LoginExpect, RegistrationExpect, ScenarioDef, StepAction,
};
use crate::report::types::{RunReport, Status};
use crate::token::TokenVerifier;
use crate::utils::config::Config;
use crate::utils::data_generator::DataGenerator;

/// Runs feature files step by step against the service.
///
/// Every scenario gets a fresh [`ScenarioContext`]. A failing step fails its
/// scenario, the remaining steps are reported as skipped and execution moves
/// on to the next scenario.
pub struct TestExecutor {
    config: Config,
    client: Arc<dyn AuthApi>,
    classifier: Arc<Classifier>,
    dispatcher: Dispatcher,
    generator: DataGenerator,
    context: ScenarioContext,
    emitter: EventEmitter,
    builder: ReportBuilder,
    listener: Option<JoinHandle<()>>,
    target_tags: Vec<String>,
    next_task_id: usize,
}

impl TestExecutor {
    pub fn new(config: Config, client: Arc<dyn AuthApi>, target_tags: Vec<String>) -> Self {
        let (emitter, receiver) = EventEmitter::new();
        let session_id = Uuid::new_v4().to_string();

        // Start console listener in background
        let listener = tokio::spawn(ConsoleEventListener::listen(receiver));

        let classifier = Arc::new(Classifier::new(
            config.rules.clone(),
            TokenVerifier::new(&config.token_secret),
        ));
        let dispatcher = Dispatcher::new(client.clone(), classifier.clone(), config.max_workers)
            .with_task_timeout(config.request_timeout());

        let mut executor = Self {
            config,
            client,
            classifier,
            dispatcher,
            generator: DataGenerator::new(),
            context: ScenarioContext::new(),
            emitter,
            builder: ReportBuilder::new(&session_id),
            listener: Some(listener),
            target_tags,
            next_task_id: 0,
        };
        executor.emit(TestEvent::RunStarted { session_id });
        executor
    }

    /// Use a specific generator, e.g. a seeded one
    pub fn with_generator(mut self, generator: DataGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Subscribe to test execution events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TestEvent> {
        self.emitter.subscribe()
    }

    pub async fn run_features(&mut self, features: &[FeatureFile]) -> HarnessResult<()> {
        for feature in features {
            self.run_feature(feature).await?;
        }
        Ok(())
    }

    pub async fn run_feature(&mut self, feature: &FeatureFile) -> HarnessResult<()> {
        let tags = self.target_tags.clone();
        let scenarios: Vec<&ScenarioDef> = feature.selected(&tags).collect();
        if scenarios.is_empty() {
            log::info!(
                "skipping feature '{}': no scenario matches tags {:?}",
                feature.feature,
                tags
            );
            return Ok(());
        }

        let started = Instant::now();
        self.emit(TestEvent::FeatureStarted {
            name: feature.feature.clone(),
            tags: feature.tags.clone(),
            scenario_count: scenarios.len(),
        });

        let mut statuses = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            statuses.push(self.run_scenario(scenario).await?);
        }

        self.emit(TestEvent::FeatureFinished {
            name: feature.feature.clone(),
            status: Status::rollup(statuses),
            duration: started.elapsed().as_secs_f64(),
        });
        Ok(())
    }

    /// Run one scenario. Only fatal errors are returned; step failures are
    /// recorded in the report.
    pub async fn run_scenario(&mut self, scenario: &ScenarioDef) -> HarnessResult<Status> {
        self.context = ScenarioContext::new();
        let started = Instant::now();

        self.emit(TestEvent::ScenarioStarted {
            name: scenario.name.clone(),
            tags: scenario.tags.clone(),
            step_count: scenario.steps.len(),
        });

        let mut status = Status::Passed;
        for (index, step) in scenario.steps.iter().enumerate() {
            if status == Status::Failed {
                self.emit(TestEvent::StepSkipped {
                    index,
                    keyword: step.keyword().to_string(),
                    text: step.text().to_string(),
                });
                continue;
            }

            self.emit(TestEvent::StepStarted {
                index,
                keyword: step.keyword().to_string(),
                text: step.text().to_string(),
            });

            let step_started = Instant::now();
            let result = self.execute_step(&step.action).await;
            let duration = step_started.elapsed().as_secs_f64();

            match result {
                Ok(()) => self.emit(TestEvent::StepPassed { index, duration }),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::debug!("step '{}' failed: {}", step.step, e);
                    self.emit(TestEvent::StepFailed {
                        index,
                        error: e.to_string(),
                        duration,
                    });
                    status = Status::Failed;
                }
            }
        }

        self.emit(TestEvent::ScenarioFinished {
            name: scenario.name.clone(),
            status,
            duration: started.elapsed().as_secs_f64(),
        });
        Ok(status)
    }

    pub async fn execute_step(&mut self, action: &StepAction) -> HarnessResult<()> {
        match action {
            StepAction::GenerateUser => {
                self.context.user = Some(self.generator.user());
            }

            StepAction::GenerateInvalidUser => {
                self.context.user = Some(self.generator.user_with_invalid_email());
            }

            StepAction::RegisterUser => {
                let user = self.generator.user();
                let response = self.client.register(&user).await?;
                self.check(&response, Expectation::Registered, &user)?;
                self.log(format!("registered {}", user.email));
                self.context.user = Some(user);
            }

            StepAction::Register => {
                let user = self.context.user()?.clone();
                let response = self.client.register(&user).await?;
                self.context.response = Some(response);
            }

            StepAction::ExpectStatus { status } => {
                let response = self.context.response()?;
                if response.status != *status {
                    return Err(HarnessError::assertion(format!(
                        "Expected status {}, got {}: {}",
                        status,
                        response.status,
                        response.body.as_deref().unwrap_or("")
                    )));
                }
            }

            StepAction::ExpectRegistration { expect } => {
                let expectation = match expect {
                    RegistrationExpect::Registered => Expectation::Registered,
                    RegistrationExpect::Duplicate => Expectation::Duplicate,
                    RegistrationExpect::Rejected => Expectation::RegistrationRejected,
                };
                let payload = self.check(self.context.response()?, expectation, self.context.user()?)?;
                if let Some(msg) = payload.get("msg").and_then(|m| m.as_str()) {
                    self.log(format!("server said: {}", msg));
                }
            }

            StepAction::RegisterUsers { count } => {
                let users: Vec<UserRecord> = (0..*count).map(|_| self.generator.user()).collect();
                let tasks = users
                    .into_iter()
                    .map(|user| TaskUnit::register(self.next_id(), user, Expectation::Registered))
                    .collect();

                let results = self.dispatcher.dispatch(tasks).await;
                let registered: Vec<UserRecord> = results
                    .into_iter()
                    .filter(|r| r.outcome.is_success())
                    .map(|r| r.input)
                    .collect();

                self.log(format!("registered {} of {} users", registered.len(), count));
                if registered.is_empty() && *count > 0 {
                    return Err(HarnessError::assertion("No user could be registered"));
                }
                self.context.users = registered;
            }

            StepAction::Login { by, password } => {
                let user = self.context.user()?;
                let input = match password {
                    Some(password) => user.with_password(password),
                    None => user.clone(),
                };
                let response = self.client.login(&input, *by).await?;
                self.context.response = Some(response);
            }

            StepAction::ExpectLogin { expect } => {
                let expectation = match expect {
                    LoginExpect::Accepted => Expectation::LoginAccepted,
                    LoginExpect::Rejected => Expectation::LoginRejected,
                };
                self.check(self.context.response()?, expectation, self.context.user()?)?;
            }

            StepAction::ConcurrentLogins { by } => {
                let users = self.context.users()?.to_vec();
                let tasks = users
                    .into_iter()
                    .map(|user| TaskUnit::login(self.next_id(), user, *by, Expectation::LoginAccepted))
                    .collect();
                self.run_batch(tasks).await;
            }

            StepAction::ExpectAllSucceeded => {
                let stats = self.context.stats()?;
                if stats.failed > 0 {
                    return Err(HarnessError::assertion(format!(
                        "{} of {} requests failed:\n{}",
                        stats.failed,
                        stats.total(),
                        failure_listing(&self.context.batch)
                    )));
                }
            }

            StepAction::ConcurrentRegistrations { count } => {
                let user = self.context.user()?.clone();
                let tasks = (0..*count)
                    .map(|_| {
                        TaskUnit::register(
                            self.next_id(),
                            user.clone(),
                            Expectation::RegisteredOrDuplicate,
                        )
                    })
                    .collect();
                self.run_batch(tasks).await;
            }

            StepAction::ExpectSingleRegistration => {
                self.context.stats()?;
                let batch = &self.context.batch;
                let failures: Vec<&TaskResult> =
                    batch.iter().filter(|r| !r.outcome.is_success()).collect();
                if !failures.is_empty() {
                    return Err(HarnessError::assertion(format!(
                        "{} of {} requests were neither registered nor duplicate:\n{}",
                        failures.len(),
                        batch.len(),
                        failure_listing(batch)
                    )));
                }

                let marker = self.classifier.rules().registered_marker.as_str();
                let registered = batch
                    .iter()
                    .filter(|r| r.outcome.message() == Some(marker))
                    .count();
                if registered != 1 {
                    return Err(HarnessError::assertion(format!(
                        "Expected exactly one '{}' out of {}, got {}",
                        marker,
                        batch.len(),
                        registered
                    )));
                }
            }

            StepAction::ExpectMaxResponseTime { max_ms } => {
                let limit_ms = max_ms.unwrap_or(self.config.max_response_time_ms);
                let stats = self.context.stats()?;
                if let Some(maximum) = stats.maximum {
                    if maximum * 1000.0 > limit_ms as f64 {
                        return Err(HarnessError::assertion(format!(
                            "Maximum response time {:.3}s exceeds {}ms",
                            maximum, limit_ms
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Close the run and return the finished report.
    ///
    /// Waits for the console listener so its output is complete before the
    /// caller prints anything else.
    pub async fn finish(mut self) -> RunReport {
        let summary = self.builder.summary();
        self.emit(TestEvent::RunFinished { summary });

        let Self {
            emitter,
            builder,
            listener,
            ..
        } = self;
        drop(emitter);
        if let Some(listener) = listener {
            if let Err(e) = listener.await {
                log::warn!("console listener stopped abnormally: {}", e);
            }
        }
        builder.finish()
    }

    async fn run_batch(&mut self, tasks: Vec<TaskUnit>) {
        let results = self.dispatcher.dispatch(tasks).await;
        self.context.record_batch(results);

        if let Ok(stats) = self.context.stats() {
            let message = format!(
                "{} requests: {} ok, {} failed, avg {:.3}s, max {:.3}s",
                stats.total(),
                stats.successful,
                stats.failed,
                stats.average,
                stats.maximum.unwrap_or(0.0)
            );
            self.log(message);
        }
    }

    fn check(
        &self,
        response: &RawResponse,
        expectation: Expectation,
        user: &UserRecord,
    ) -> HarnessResult<serde_json::Value> {
        match self.classifier.classify(response, expectation, user) {
            TaskOutcome::Success(payload) => Ok(payload),
            TaskOutcome::Failure(reason) => Err(HarnessError::Assertion(reason)),
            TaskOutcome::Exception(error) => Err(HarnessError::Transport(error)),
        }
    }

    fn next_id(&mut self) -> usize {
        let id = self.next_task_id;
        self.next_task_id += 1;
        id
    }

    fn log(&mut self, message: String) {
        self.emit(TestEvent::Log { message });
    }

    fn emit(&mut self, event: TestEvent) {
        self.builder.on_event(&event);
        self.emitter.emit(event);
    }
}

fn failure_listing(batch: &[TaskResult]) -> String {
    batch
        .iter()
        .filter_map(|r| {
            r.outcome
                .reason()
                .map(|reason| format!("- {}: {}", r.input.label(), reason))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
