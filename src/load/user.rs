//! Virtual users for load runs.
//!
//! Each virtual user picks a weighted task, runs it through the shared
//! [`Dispatcher`], forwards the results to the collector and waits a random
//! think time before the next pick.

use crate::error::{HarnessError, HarnessResult};
use crate::runner::dispatcher::Dispatcher;
use crate::runner::task::{Expectation, LoginMode, TaskResult, TaskUnit, UserRecord};
use crate::utils::data_generator::{invalid_credentials, special_credentials, DataGenerator};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Users registered by each virtual user before its first task
const POOL_SIZE: usize = 5;

/// Copies sent by the concurrent tasks
const CONCURRENT_COPIES: usize = 3;

/// Longest uninterrupted sleep, so a stop request is noticed quickly
const STOP_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserClass {
    Registration,
    Login,
}

impl UserClass {
    /// Classes alternate as users are spawned
    pub fn for_index(index: usize) -> Self {
        if index % 2 == 0 {
            UserClass::Registration
        } else {
            UserClass::Login
        }
    }

    pub fn tasks(&self) -> &'static [LoadTask] {
        match self {
            UserClass::Registration => &[
                LoadTask::ValidRegistration,
                LoadTask::DuplicateRegistration,
                LoadTask::InvalidRegistration,
                LoadTask::ConcurrentRegistration,
                LoadTask::PasswordVariation,
            ],
            UserClass::Login => &[
                LoadTask::ValidLogin,
                LoadTask::InvalidLogin,
                LoadTask::SpecialCharacterLogin,
                LoadTask::ConcurrentLogin,
                LoadTask::UsernameLogin,
            ],
        }
    }

    fn setup_name(&self) -> &'static str {
        match self {
            UserClass::Registration => "registration_setup",
            UserClass::Login => "login_setup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTask {
    ValidRegistration,
    DuplicateRegistration,
    InvalidRegistration,
    ConcurrentRegistration,
    PasswordVariation,
    ValidLogin,
    InvalidLogin,
    SpecialCharacterLogin,
    ConcurrentLogin,
    UsernameLogin,
}

impl LoadTask {
    /// Request name used in statistics
    pub fn name(&self) -> &'static str {
        match self {
            LoadTask::ValidRegistration => "registration_valid",
            LoadTask::DuplicateRegistration => "registration_duplicate",
            LoadTask::InvalidRegistration => "registration_invalid",
            LoadTask::ConcurrentRegistration => "concurrent_registration",
            LoadTask::PasswordVariation => "registration_password_variation",
            LoadTask::ValidLogin => "login_valid",
            LoadTask::InvalidLogin => "login_invalid",
            LoadTask::SpecialCharacterLogin => "login_special_characters",
            LoadTask::ConcurrentLogin => "concurrent_login",
            LoadTask::UsernameLogin => "login_username",
        }
    }

    pub fn weight(&self) -> u32 {
        match self {
            LoadTask::ValidRegistration => 40,
            LoadTask::DuplicateRegistration => 20,
            LoadTask::InvalidRegistration => 20,
            LoadTask::ConcurrentRegistration => 10,
            LoadTask::PasswordVariation => 10,
            LoadTask::ValidLogin => 60,
            LoadTask::InvalidLogin => 20,
            LoadTask::SpecialCharacterLogin => 10,
            LoadTask::ConcurrentLogin => 5,
            LoadTask::UsernameLogin => 5,
        }
    }
}

/// When a virtual user has to stop
#[derive(Clone)]
pub struct StopSignal {
    pub deadline: Instant,
    pub interrupted: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn should_stop(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst) || Instant::now() >= self.deadline
    }

    /// Sleep for `duration`, returning early once a stop is requested
    pub async fn sleep(&self, duration: Duration) {
        let until = (Instant::now() + duration).min(self.deadline);
        while !self.should_stop() {
            let now = Instant::now();
            if now >= until {
                break;
            }
            tokio::time::sleep((until - now).min(STOP_POLL)).await;
        }
    }
}

pub struct VirtualUser {
    id: usize,
    class: UserClass,
    dispatcher: Arc<Dispatcher>,
    generator: DataGenerator,
    weights: WeightedIndex<u32>,
    pool: Vec<UserRecord>,
    task_ids: Arc<AtomicUsize>,
    sink: mpsc::UnboundedSender<TaskResult>,
    wait_time: (f64, f64),
}

impl VirtualUser {
    pub fn new(
        id: usize,
        class: UserClass,
        dispatcher: Arc<Dispatcher>,
        task_ids: Arc<AtomicUsize>,
        sink: mpsc::UnboundedSender<TaskResult>,
        wait_time: (f64, f64),
    ) -> HarnessResult<Self> {
        let weights = WeightedIndex::new(class.tasks().iter().map(|t| t.weight()))
            .map_err(|e| HarnessError::Config(format!("invalid task weights: {}", e)))?;

        Ok(Self {
            id,
            class,
            dispatcher,
            generator: DataGenerator::new(),
            weights,
            pool: Vec::new(),
            task_ids,
            sink,
            wait_time,
        })
    }

    pub async fn run(mut self, stop: StopSignal) {
        log::debug!("virtual user {} ({:?}) started", self.id, self.class);
        self.on_start().await;

        let mut iterations = 0usize;
        while !stop.should_stop() {
            let task = self.next_task();
            self.execute(task).await;
            iterations += 1;

            let wait = self.think_time();
            stop.sleep(wait).await;
        }
        log::debug!(
            "virtual user {} stopped after {} tasks",
            self.id,
            iterations
        );
    }

    /// Register the pool of users later tasks log in with or duplicate
    async fn on_start(&mut self) {
        let name = self.class.setup_name();
        let tasks = (0..POOL_SIZE)
            .map(|_| {
                let user = self.generator.user();
                TaskUnit::register(self.next_id(), user, Expectation::Registered).named(name)
            })
            .collect();

        for result in self.dispatcher.dispatch(tasks).await {
            if result.outcome.is_success() {
                self.pool.push(result.input.clone());
            }
            self.forward(result);
        }
        if self.pool.is_empty() {
            log::warn!(
                "virtual user {} could not register any pool user; pool tasks will be skipped",
                self.id
            );
        }
    }

    fn next_task(&mut self) -> LoadTask {
        let index = self.weights.sample(self.generator.rng());
        self.class.tasks()[index]
    }

    fn think_time(&mut self) -> Duration {
        let (min, max) = self.wait_time;
        let secs = if max > min {
            self.generator.rng().gen_range(min..=max)
        } else {
            min
        };
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Build the requests for `task`. Empty when the task needs a pool user
    /// and there is none.
    pub fn build(&mut self, task: LoadTask) -> Vec<TaskUnit> {
        let tasks = match task {
            LoadTask::ValidRegistration => {
                let user = self.generator.user();
                vec![TaskUnit::register(self.next_id(), user, Expectation::Registered)]
            }
            LoadTask::DuplicateRegistration => match self.pool_user() {
                Some(user) => vec![TaskUnit::register(self.next_id(), user, Expectation::Duplicate)],
                None => Vec::new(),
            },
            LoadTask::InvalidRegistration => {
                let user = self.generator.invalid_user();
                vec![TaskUnit::register(
                    self.next_id(),
                    user,
                    Expectation::RegistrationRejected,
                )]
            }
            LoadTask::ConcurrentRegistration => {
                let user = self.generator.user();
                (0..CONCURRENT_COPIES)
                    .map(|_| {
                        TaskUnit::register(
                            self.next_id(),
                            user.clone(),
                            Expectation::RegisteredOrDuplicate,
                        )
                    })
                    .collect()
            }
            LoadTask::PasswordVariation => {
                let password = self.generator.password_variation();
                let user = self.generator.user().with_password(&password);
                vec![TaskUnit::register(self.next_id(), user, Expectation::StatusOk)]
            }
            LoadTask::ValidLogin => match self.pool_user() {
                Some(user) => vec![TaskUnit::login(
                    self.next_id(),
                    user,
                    LoginMode::Email,
                    Expectation::LoginAccepted,
                )],
                None => Vec::new(),
            },
            LoadTask::InvalidLogin => {
                let credentials = invalid_credentials();
                match self.generator.pick(&credentials).cloned() {
                    Some(user) => vec![TaskUnit::login(
                        self.next_id(),
                        user,
                        LoginMode::Email,
                        Expectation::LoginRejected,
                    )],
                    None => Vec::new(),
                }
            }
            LoadTask::SpecialCharacterLogin => {
                let credentials = special_credentials();
                match self.generator.pick(&credentials).cloned() {
                    Some(user) => vec![TaskUnit::login(
                        self.next_id(),
                        user,
                        LoginMode::Email,
                        Expectation::StatusOk,
                    )],
                    None => Vec::new(),
                }
            }
            LoadTask::ConcurrentLogin => match self.pool_user() {
                Some(user) => (0..CONCURRENT_COPIES)
                    .map(|_| {
                        TaskUnit::login(
                            self.next_id(),
                            user.clone(),
                            LoginMode::Email,
                            Expectation::LoginAccepted,
                        )
                    })
                    .collect(),
                None => Vec::new(),
            },
            LoadTask::UsernameLogin => match self.pool_user() {
                Some(user) => vec![TaskUnit::login(
                    self.next_id(),
                    user,
                    LoginMode::Username,
                    Expectation::LoginAcceptedOrRejected,
                )],
                None => Vec::new(),
            },
        };
        tasks.into_iter().map(|t| t.named(task.name())).collect()
    }

    async fn execute(&mut self, task: LoadTask) {
        let tasks = self.build(task);
        if tasks.is_empty() {
            log::debug!("virtual user {}: skipping {} (empty pool)", self.id, task.name());
            return;
        }
        for result in self.dispatcher.dispatch(tasks).await {
            self.forward(result);
        }
    }

    fn forward(&self, result: TaskResult) {
        // The collector only goes away once every user has finished
        if self.sink.send(result).is_err() {
            log::warn!("virtual user {}: result collector is gone", self.id);
        }
    }

    fn pool_user(&mut self) -> Option<UserRecord> {
        let pool = &self.pool;
        self.generator.pick(pool).cloned()
    }

    fn next_id(&self) -> usize {
        self.task_ids.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{AuthApi, RawResponse};
    use crate::runner::classifier::Classifier;
    use crate::runner::task::TaskKind;
    use crate::token::TokenVerifier;
    use crate::utils::config::ClassificationRules;
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl AuthApi for Unreachable {
        async fn register(&self, _user: &UserRecord) -> HarnessResult<RawResponse> {
            Err(HarnessError::Transport("unreachable".into()))
        }

        async fn login(&self, _user: &UserRecord, _mode: LoginMode) -> HarnessResult<RawResponse> {
            Err(HarnessError::Transport("unreachable".into()))
        }
    }

    fn user(class: UserClass) -> (VirtualUser, mpsc::UnboundedReceiver<TaskResult>) {
        let classifier = Classifier::new(ClassificationRules::default(), TokenVerifier::new("k"));
        let dispatcher = Dispatcher::new(Arc::new(Unreachable), Arc::new(classifier), 4);
        let (tx, rx) = mpsc::unbounded_channel();
        let vu = VirtualUser::new(
            0,
            class,
            Arc::new(dispatcher),
            Arc::new(AtomicUsize::new(0)),
            tx,
            (0.0, 0.0),
        )
        .unwrap();
        (vu, rx)
    }

    #[test]
    fn test_weights_match_task_mix() {
        let registration: u32 = UserClass::Registration.tasks().iter().map(|t| t.weight()).sum();
        let login: u32 = UserClass::Login.tasks().iter().map(|t| t.weight()).sum();
        assert_eq!(registration, 100);
        assert_eq!(login, 100);
        assert_eq!(UserClass::for_index(0), UserClass::Registration);
        assert_eq!(UserClass::for_index(1), UserClass::Login);
    }

    #[tokio::test]
    async fn test_pool_tasks_need_a_pool() {
        let (mut vu, _rx) = user(UserClass::Login);
        assert!(vu.build(LoadTask::ValidLogin).is_empty());
        assert!(vu.build(LoadTask::DuplicateRegistration).is_empty());

        let invalid = vu.build(LoadTask::InvalidLogin);
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].name, "login_invalid");
        assert_eq!(invalid[0].expectation, Expectation::LoginRejected);
    }

    #[tokio::test]
    async fn test_concurrent_registration_reuses_payload() {
        let (mut vu, _rx) = user(UserClass::Registration);
        let tasks = vu.build(LoadTask::ConcurrentRegistration);
        assert_eq!(tasks.len(), CONCURRENT_COPIES);
        assert!(tasks.iter().all(|t| t.input == tasks[0].input));
        assert!(tasks.iter().all(|t| t.kind == TaskKind::Register));

        let ids: std::collections::HashSet<_> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), CONCURRENT_COPIES);
    }

    #[tokio::test]
    async fn test_run_stops_at_deadline_and_forwards_results() {
        let (vu, mut rx) = user(UserClass::Registration);
        let stop = StopSignal {
            deadline: Instant::now() + Duration::from_millis(100),
            interrupted: Arc::new(AtomicBool::new(false)),
        };
        vu.run(stop).await;

        let mut setup = 0;
        while let Ok(result) = rx.try_recv() {
            assert!(!result.outcome.is_success());
            if result.name == "registration_setup" {
                setup += 1;
            }
        }
        assert_eq!(setup, POOL_SIZE);
    }

    #[tokio::test]
    async fn test_interrupt_stops_sleep() {
        let stop = StopSignal {
            deadline: Instant::now() + Duration::from_secs(60),
            interrupted: Arc::new(AtomicBool::new(true)),
        };
        let started = Instant::now();
        stop.sleep(Duration::from_secs(30)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
