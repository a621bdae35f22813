pub mod aggregate;
pub mod classifier;
pub mod context;
pub mod dispatcher;
pub mod events;
pub mod executor;
pub mod state;
pub mod task;

use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

use crate::client::HttpAuthClient;
use crate::parser::yaml;
use crate::report::{self, types::RunReport};
use crate::utils::config::Config;

pub use events::*;
pub use state::*;

/// Run the functional suite and write its reports into `output`.
///
/// Features come from `features` (a file or directory) or, when `None`, from
/// the suite compiled into the binary. `tags` narrows the run to scenarios
/// carrying at least one of them.
pub async fn run_functional(
    config: Config,
    features: Option<&Path>,
    output: &Path,
    tags: Vec<String>,
) -> Result<RunReport> {
    config.validate()?;

    let feature_files = match features {
        Some(path) => yaml::load_features(path)?,
        None => yaml::builtin_features()?,
    };
    if feature_files.is_empty() {
        println!("{} No feature files found.", "ℹ".blue());
    }
    log::info!(
        "loaded {} feature(s) against {}",
        feature_files.len(),
        config.base_url
    );

    let client = Arc::new(HttpAuthClient::new(&config)?);
    let mut executor = executor::TestExecutor::new(config, client, tags);

    let outcome = executor.run_features(&feature_files).await;
    let run = executor.finish().await;
    outcome?;

    let artifacts = report::write_run_reports(&run, output)?;
    println!("\n{} Reports generated:", "📊".to_string().blue());
    println!("  Results: {}", artifacts.results.display().to_string().cyan());
    println!("  HTML: {}", artifacts.html.display().to_string().cyan());
    println!("  JUnit: {}", artifacts.junit.display().to_string().cyan());

    Ok(run)
}
