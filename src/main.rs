use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use authprobe::client::HttpAuthClient;
use authprobe::load::{self, LoadOptions};
use authprobe::report::{self, ReportFormat};
use authprobe::runner;
use authprobe::utils::config::Config;

#[derive(Parser)]
#[command(name = "authprobe")]
#[command(version = "0.1.0")]
#[command(about = "Functional and load testing for registration/login services", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the functional feature suite
    Functional {
        /// Feature file or directory. The built-in suite runs when omitted.
        #[arg(short, long)]
        features: Option<PathBuf>,

        /// Output directory for results.json, report.html and junit.xml
        #[arg(short, long, default_value = "./reports")]
        output: PathBuf,

        /// Base URL of the service under test
        #[arg(long, env = "AUTHPROBE_BASE_URL")]
        base_url: Option<String>,

        /// YAML configuration file
        #[arg(short, long, env = "AUTHPROBE_CONFIG")]
        config: Option<PathBuf>,

        /// Filter scenarios by tags (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// Run a load test with virtual users
    Load {
        /// Base URL of the service under test
        #[arg(long, env = "AUTHPROBE_BASE_URL")]
        host: Option<String>,

        /// Number of concurrent virtual users
        #[arg(short, long, default_value = "10")]
        users: usize,

        /// Users started per second
        #[arg(short = 'r', long, default_value = "1")]
        spawn_rate: f64,

        /// Run time, e.g. 90, 30s, 5m, 1h30m
        #[arg(short = 't', long, default_value = "60s", value_parser = load::parse_run_time)]
        run_time: Duration,

        /// Write <PREFIX>_stats.csv and <PREFIX>_failures.csv
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write an HTML report to this path
        #[arg(long)]
        html: Option<PathBuf>,

        /// Directory for the timestamped JSON report
        #[arg(long, default_value = "./reports")]
        reports_dir: PathBuf,

        /// YAML configuration file
        #[arg(short, long, env = "AUTHPROBE_CONFIG")]
        config: Option<PathBuf>,

        /// Hide the progress spinner
        #[arg(long, default_value = "false")]
        no_progress: bool,
    },

    /// Generate a report from a saved results.json
    Report {
        /// Path to results JSON file
        results: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "html")]
        format: ReportFormat,

        /// Output file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Functional {
            features,
            output,
            base_url,
            config,
            tags,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(url) = base_url {
                config.base_url = url;
            }

            println!(
                "{} Running functional suite against: {}",
                "▶".green().bold(),
                config.base_url.cyan()
            );
            match features {
                Some(ref path) => println!("  Features: {}", path.display().to_string().cyan()),
                None => println!("  Features: {}", "built-in".cyan()),
            }
            if !tags.is_empty() {
                println!("  Tags: {}", tags.join(", ").yellow());
            }
            println!("  Output: {}", output.display().to_string().cyan());

            let run = runner::run_functional(config, features.as_deref(), &output, tags).await?;
            if !run.passed() {
                std::process::exit(1);
            }
        }

        Commands::Load {
            host,
            users,
            spawn_rate,
            run_time,
            csv,
            html,
            reports_dir,
            config,
            no_progress,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(host) = host {
                config.base_url = host;
            }
            config.validate()?;

            println!(
                "{} Load test against: {}",
                "▶".green().bold(),
                config.base_url.cyan()
            );
            println!(
                "  Users: {}, spawn rate: {}/s, run time: {}s",
                users.to_string().cyan(),
                spawn_rate.to_string().cyan(),
                run_time.as_secs().to_string().cyan()
            );

            let interrupted = Arc::new(AtomicBool::new(false));
            let handler_flag = interrupted.clone();
            ctrlc::set_handler(move || {
                println!("\n{} Stopping load test...", "⏹".yellow());
                handler_flag.store(true, Ordering::SeqCst);
            })?;

            let client = Arc::new(HttpAuthClient::new(&config)?);
            let options = LoadOptions {
                users,
                spawn_rate,
                run_time,
                progress: !no_progress,
            };
            let load_report = load::run_load(&config, client, &options, interrupted).await?;

            let aggregated = &load_report.aggregated;
            println!("\n{} Load test finished", "■".blue().bold());
            if load_report.stopped_early {
                println!("  {}", "Stopped early".yellow());
            }
            println!(
                "  Requests: {} ({} ok, {} failed)",
                aggregated.total(),
                aggregated.successful.to_string().green(),
                aggregated.failed.to_string().red()
            );
            for (operation, stats) in &load_report.operations {
                println!(
                    "  {}: success rate {}, avg {:.3}s",
                    operation.as_str(),
                    stats.success_rate(),
                    stats.average
                );
            }
            for violation in &load_report.violations {
                println!(
                    "  {} {}: {}",
                    "⚠".yellow(),
                    violation.operation.as_str(),
                    violation.message
                );
            }

            let written = report::write_load_reports(
                &load_report,
                csv.as_deref(),
                html.as_deref(),
                &reports_dir,
            )?;
            println!("\n{} Reports generated:", "📊".to_string().blue());
            for path in written {
                println!("  {}", path.display().to_string().cyan());
            }
        }

        Commands::Report {
            results,
            format,
            output,
        } => {
            eprintln!(
                "{} Generating {:?} report from: {}",
                "📊".to_string().blue(),
                format,
                results.display()
            );
            report::generate_report(&results, format, output.as_deref())?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None => Ok(Config::default()),
    }
}
