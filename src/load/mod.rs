//! Locust-style load runs against the registration and login endpoints.

pub mod stats;
pub mod user;

use crate::client::AuthApi;
use crate::error::{HarnessError, HarnessResult};
use crate::runner::classifier::Classifier;
use crate::runner::dispatcher::Dispatcher;
use crate::runner::task::TaskResult;
use crate::token::TokenVerifier;
use crate::utils::config::Config;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use stats::{LoadConfiguration, LoadReport, Thresholds};
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use user::{StopSignal, UserClass, VirtualUser};

/// Shape of a load run
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub users: usize,
    /// Users started per second
    pub spawn_rate: f64,
    pub run_time: Duration,
    /// Show a progress bar (only drawn on a terminal)
    pub progress: bool,
}

/// Run virtual users until `run_time` elapses or `interrupted` is set.
///
/// Users are started at `spawn_rate` per second, alternating between the
/// registration and login classes. Every request result flows to a single
/// collector, which builds the final report once all users have stopped.
pub async fn run_load(
    config: &Config,
    client: Arc<dyn AuthApi>,
    options: &LoadOptions,
    interrupted: Arc<AtomicBool>,
) -> HarnessResult<LoadReport> {
    let spawn_interval = Duration::try_from_secs_f64(1.0 / options.spawn_rate)
        .ok()
        .filter(|_| options.spawn_rate > 0.0)
        .ok_or_else(|| {
            HarnessError::Config(format!(
                "spawn rate must be a positive number, got {}",
                options.spawn_rate
            ))
        })?;

    let started_at = chrono::Local::now();
    let started = Instant::now();
    let stop = StopSignal {
        deadline: started + options.run_time,
        interrupted: interrupted.clone(),
    };

    let classifier = Arc::new(Classifier::new(
        config.rules.clone(),
        TokenVerifier::new(&config.token_secret),
    ));
    let dispatcher = Arc::new(
        Dispatcher::new(client, classifier, config.max_workers)
            .with_task_timeout(config.request_timeout()),
    );

    let progress = progress_bar(options);
    let (tx, rx) = mpsc::unbounded_channel();
    let collector = tokio::spawn(collect(rx, progress.clone()));

    let task_ids = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::with_capacity(options.users);

    for index in 0..options.users {
        if stop.should_stop() {
            break;
        }
        let user = VirtualUser::new(
            index,
            UserClass::for_index(index),
            dispatcher.clone(),
            task_ids.clone(),
            tx.clone(),
            (config.wait_time_min, config.wait_time_max),
        )?;
        handles.push(tokio::spawn(user.run(stop.clone())));
        progress.set_message(format!("{} users", handles.len()));

        if index + 1 < options.users {
            stop.sleep(spawn_interval).await;
        }
    }
    drop(tx);
    log::info!("spawned {} virtual users", handles.len());

    for handle in handles {
        if let Err(e) = handle.await {
            log::warn!("virtual user ended abnormally: {}", e);
        }
    }

    let results = collector.await.unwrap_or_else(|e| {
        log::error!("result collector failed: {}", e);
        Vec::new()
    });
    progress.finish_and_clear();

    let configuration = LoadConfiguration {
        host: config.base_url.clone(),
        users: options.users,
        spawn_rate: options.spawn_rate,
        run_time_seconds: options.run_time.as_secs(),
        wait_time_min: config.wait_time_min,
        wait_time_max: config.wait_time_max,
    };
    let thresholds = Thresholds {
        max_response_time_ms: config.max_response_time_ms,
        success_rate: config.success_rate_threshold,
    };

    let mut report = LoadReport::build(
        configuration,
        started_at,
        started.elapsed().as_secs_f64(),
        &results,
        thresholds,
    );
    report.stopped_early = interrupted.load(Ordering::SeqCst);
    Ok(report)
}

async fn collect(
    mut rx: mpsc::UnboundedReceiver<TaskResult>,
    progress: ProgressBar,
) -> Vec<TaskResult> {
    let mut results = Vec::new();
    while let Some(result) = rx.recv().await {
        results.push(result);
        progress.inc(1);
    }
    results
}

fn progress_bar(options: &LoadOptions) -> ProgressBar {
    let bar = if options.progress && std::io::stdout().is_terminal() {
        ProgressBar::new_spinner()
    } else {
        ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden())
    };
    if let Ok(style) =
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {pos} requests, {msg}")
    {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Parse run times like `90`, `30s`, `5m`, `1h30m`
pub fn parse_run_time(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("empty run time".to_string());
    }
    if let Ok(secs) = value.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for c in value.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let amount: u64 = digits
            .parse()
            .map_err(|_| format!("invalid run time '{}'", value))?;
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(format!("unknown unit '{}' in run time '{}'", c, value)),
        };
        total = amount
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| format!("run time '{}' is too large", value))?;
        digits.clear();
    }
    if !digits.is_empty() {
        return Err(format!("missing unit at end of run time '{}'", value));
    }
    Ok(Duration::from_secs(total))
}
