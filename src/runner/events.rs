use crate::report::types::{RunSummary, Status};
use tokio::sync::broadcast;

/// Test execution events for real-time updates
#[derive(Debug, Clone)]
pub enum TestEvent {
    // Run events
    RunStarted {
        session_id: String,
    },
    RunFinished {
        summary: RunSummary,
    },

    // Feature events
    FeatureStarted {
        name: String,
        tags: Vec<String>,
        scenario_count: usize,
    },
    FeatureFinished {
        name: String,
        status: Status,
        duration: f64,
    },

    // Scenario events
    ScenarioStarted {
        name: String,
        tags: Vec<String>,
        step_count: usize,
    },
    ScenarioFinished {
        name: String,
        status: Status,
        duration: f64,
    },

    // Step events
    StepStarted {
        index: usize,
        keyword: String,
        text: String,
    },
    StepPassed {
        index: usize,
        duration: f64,
    },
    StepFailed {
        index: usize,
        error: String,
        duration: f64,
    },
    StepSkipped {
        index: usize,
        keyword: String,
        text: String,
    },

    // Log event for coordinated output
    Log {
        message: String,
    },
}

/// Event emitter for broadcasting test events
pub struct EventEmitter {
    sender: broadcast::Sender<TestEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<TestEvent>) {
        let (sender, receiver) = broadcast::channel(256);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: TestEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TestEvent> {
        self.sender.subscribe()
    }
}

/// Console event listener for printing real-time updates
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<TestEvent>) {
        use colored::Colorize;

        // Step text is only known at start; keep it for the result line
        let mut current_step = String::new();

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    log::warn!("console listener missed {} events", missed);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                TestEvent::RunStarted { session_id } => {
                    println!(
                        "\n{} Test session started: {}",
                        "▶".green().bold(),
                        session_id.cyan()
                    );
                }

                TestEvent::RunFinished { summary } => {
                    println!("\n{} Test session finished", "■".blue().bold());
                    println!("  Features: {}", summary.total_features);
                    println!("  Scenarios: {}", summary.total_scenarios);
                    println!(
                        "  {} passed, {} failed",
                        summary.passed.to_string().green(),
                        summary.failed.to_string().red()
                    );
                    println!(
                        "  Steps: {} total, {} failed, {} skipped",
                        summary.total_steps,
                        summary.failed_steps.to_string().red(),
                        summary.skipped_steps.to_string().yellow()
                    );
                    println!("  Duration: {:.2}s", summary.duration);
                }

                TestEvent::FeatureStarted {
                    name,
                    tags,
                    scenario_count,
                } => {
                    let tags = if tags.is_empty() {
                        String::new()
                    } else {
                        format!(" @{}", tags.join(" @")).dimmed().to_string()
                    };
                    println!(
                        "\n{} Feature: {}{} ({} scenarios)",
                        "→".blue(),
                        name.white().bold(),
                        tags,
                        scenario_count
                    );
                }

                TestEvent::FeatureFinished {
                    name,
                    status,
                    duration,
                } => {
                    println!(
                        "{} Feature {} [{}] {:.2}s",
                        "←".blue(),
                        name,
                        status_label(status),
                        duration
                    );
                }

                TestEvent::ScenarioStarted {
                    name, step_count, ..
                } => {
                    println!("\n    Scenario: {} ({} steps)", name.bold(), step_count);
                }

                TestEvent::ScenarioFinished {
                    status, duration, ..
                } => {
                    println!("    {} {:.3}s", status_label(status), duration);
                }

                TestEvent::StepStarted {
                    index,
                    keyword,
                    text,
                } => {
                    current_step = format!("[{}] {} {}", index, keyword, text);
                }

                TestEvent::StepPassed { duration, .. } => {
                    println!(
                        "        {} {} ({:.3}s)",
                        "✓".green(),
                        current_step,
                        duration
                    );
                }

                TestEvent::StepFailed {
                    error, duration, ..
                } => {
                    println!("        {} {} ({:.3}s)", "✗".red(), current_step, duration);
                    for line in error.lines() {
                        println!("            {}", line.red());
                    }
                }

                TestEvent::StepSkipped {
                    index,
                    keyword,
                    text,
                } => {
                    println!(
                        "        {} {}",
                        "○".yellow(),
                        format!("[{}] {} {}", index, keyword, text).dimmed()
                    );
                }

                TestEvent::Log { message } => {
                    println!("            {}", message.dimmed());
                }
            }
        }
    }
}

fn status_label(status: Status) -> colored::ColoredString {
    use colored::Colorize;
    match status {
        Status::Passed => "PASSED".green().bold(),
        Status::Failed => "FAILED".red().bold(),
        Status::Skipped => "SKIPPED".yellow().bold(),
    }
}
