mod common;

use authprobe::client::{AuthApi, HttpAuthClient};
use authprobe::runner::aggregate::AggregateStats;
use authprobe::runner::classifier::Classifier;
use authprobe::runner::dispatcher::Dispatcher;
use authprobe::runner::task::{Expectation, LoginMode, TaskOutcome, TaskUnit};
use authprobe::token::TokenVerifier;
use authprobe::utils::config::Config;
use authprobe::utils::data_generator::DataGenerator;
use common::MockService;
use std::sync::Arc;

fn classifier(config: &Config) -> Arc<Classifier> {
    Arc::new(Classifier::new(
        config.rules.clone(),
        TokenVerifier::new(&config.token_secret),
    ))
}

#[tokio::test]
async fn test_register_then_login_returns_matching_claims() {
    let service = MockService::start().await;
    let config = service.config();
    let client = HttpAuthClient::new(&config).unwrap();
    let classifier = classifier(&config);
    let user = DataGenerator::seeded(7).user();

    let response = client.register(&user).await.unwrap();
    let outcome = classifier.classify(&response, Expectation::Registered, &user);
    assert_eq!(outcome.message(), Some("User Registered"));

    for mode in [LoginMode::Email, LoginMode::Username] {
        let response = client.login(&user, mode).await.unwrap();
        match classifier.classify(&response, Expectation::LoginAccepted, &user) {
            TaskOutcome::Success(claims) => {
                assert_eq!(claims["email"], user.email.as_str());
                assert_eq!(claims["userName"], user.user_name.as_str());
            }
            other => panic!("login by {:?} failed: {:?}", mode, other),
        }
    }
}

#[tokio::test]
async fn test_wrong_password_is_a_failure() {
    let service = MockService::start().await;
    let config = service.config();
    let client = HttpAuthClient::new(&config).unwrap();
    let classifier = classifier(&config);
    let user = DataGenerator::seeded(11).user();
    client.register(&user).await.unwrap();

    let wrong = user.with_password("definitely-not-the-password");
    let response = client.login(&wrong, LoginMode::Email).await.unwrap();

    assert_eq!(
        classifier.classify(&response, Expectation::LoginAccepted, &wrong),
        TaskOutcome::Failure("Login failed: Invalid Password".to_string())
    );
    assert!(classifier
        .classify(&response, Expectation::LoginRejected, &wrong)
        .is_success());
}

#[tokio::test]
async fn test_concurrent_logins_all_succeed() {
    let service = MockService::start().await;
    let config = service.config();
    let client = Arc::new(HttpAuthClient::new(&config).unwrap());
    let dispatcher = Dispatcher::new(client.clone(), classifier(&config), config.max_workers);

    let mut generator = DataGenerator::seeded(3);
    let users: Vec<_> = (0..10).map(|_| generator.user()).collect();
    for user in &users {
        client.register(user).await.unwrap();
    }

    let tasks = users
        .iter()
        .enumerate()
        .map(|(id, user)| {
            TaskUnit::login(id, user.clone(), LoginMode::Email, Expectation::LoginAccepted)
        })
        .collect();
    let results = dispatcher.dispatch(tasks).await;

    let stats = AggregateStats::from_results(&results);
    assert_eq!(results.len(), 10);
    assert_eq!(stats.successful, 10, "{:?}", results);
    assert_eq!(stats.success_rate(), "100.00%");

    let mut ids: Vec<_> = results.iter().map(|r| r.task_id).collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..10).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_concurrent_duplicate_registration_registers_once() {
    let service = MockService::start().await;
    let config = service.config();
    let client = Arc::new(HttpAuthClient::new(&config).unwrap());
    let dispatcher = Dispatcher::new(client, classifier(&config), 3);

    let user = DataGenerator::seeded(5).user();
    let tasks = (0..3)
        .map(|id| TaskUnit::register(id, user.clone(), Expectation::RegisteredOrDuplicate))
        .collect();
    let results = dispatcher.dispatch(tasks).await;

    assert!(results.iter().all(|r| r.outcome.is_success()), "{:?}", results);
    let registered = results
        .iter()
        .filter(|r| r.outcome.message() == Some("User Registered"))
        .count();
    let duplicates = results
        .iter()
        .filter(|r| r.outcome.message() == Some("Email already Exist"))
        .count();
    assert_eq!(registered, 1);
    assert_eq!(duplicates, 2);
}

#[tokio::test]
async fn test_unreachable_service_is_an_exception() {
    let config = Config {
        base_url: "http://127.0.0.1:1".to_string(),
        ..Config::default()
    };
    let client = Arc::new(HttpAuthClient::new(&config).unwrap());
    let dispatcher = Dispatcher::new(client, classifier(&config), 2);
    let user = DataGenerator::seeded(1).user();

    let results = dispatcher
        .dispatch(vec![TaskUnit::register(0, user, Expectation::Registered)])
        .await;

    assert_eq!(results.len(), 1);
    assert!(matches!(results[0].outcome, TaskOutcome::Exception(_)));
}
