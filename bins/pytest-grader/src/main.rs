mod config;
mod emitter;
mod engine;
mod evaluator;
mod executor;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use config::{parse_flag, parse_input, GraderSettings};
use emitter::OutputChannel;
use grader_common::config::RunnerEnv;
use std::path::PathBuf;
use tracing::{error, info};

/// Inputs follow the action's input names; each flag falls back to the
/// `INPUT_*` variable the runner sets for it.
#[derive(Parser, Debug)]
#[command(name = "pytest-grader")]
#[command(about = "Run pytest and emit an autograding result payload", long_about = None)]
struct Cli {
    /// Name reported for the single graded test
    #[arg(long, env = "INPUT_TEST-NAME")]
    test_name: Option<String>,

    /// Test file, class or node id passed to pytest
    #[arg(long, env = "INPUT_TEST-CLASS")]
    test_class: Option<String>,

    /// Directory containing `test_class`
    #[arg(long, env = "INPUT_TEST-DIR")]
    test_dir: Option<String>,

    /// Shell command run before the tests
    #[arg(long, env = "INPUT_SETUP-COMMAND")]
    setup_command: Option<String>,

    /// Test run timeout in minutes
    #[arg(long, env = "INPUT_TIMEOUT")]
    timeout: Option<String>,

    /// Points awarded when every test passes
    #[arg(long, env = "INPUT_MAX-SCORE")]
    max_score: Option<String>,

    /// Award points proportionally to passing tests
    #[arg(long, env = "INPUT_PARTIAL-CREDIT")]
    partial_credit: Option<String>,

    /// JUnit XML report written by the runner
    #[arg(long)]
    report_path: Option<PathBuf>,

    /// Test command prefix
    #[arg(long)]
    runner: Option<String>,

    /// Do not pip install pytest and requirements.txt
    #[arg(long, default_value = "false")]
    skip_install: bool,

    /// Directory the tests run in
    #[arg(long, default_value = ".")]
    working_dir: PathBuf,

    /// JSON file with default settings
    #[arg(long, env = "GRADER_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    fn settings(&self) -> Result<GraderSettings> {
        Ok(GraderSettings {
            test_name: self.test_name.clone(),
            test_class: self.test_class.clone(),
            test_dir: self.test_dir.clone(),
            setup_command: self.setup_command.clone(),
            timeout: parse_input("timeout", self.timeout.as_deref())?,
            max_score: parse_input("max-score", self.max_score.as_deref())?,
            partial_credit: parse_flag("partial-credit", self.partial_credit.as_deref())?,
            report_path: self.report_path.clone(),
            runner: self.runner.clone(),
            install_dependencies: self.skip_install.then_some(false),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the output channel
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(true)
        .init();

    let cli = Cli::parse();

    let file_settings = match &cli.config {
        Some(path) => GraderSettings::load(path).map_err(|e| {
            error!("Failed to load grader config: {:#}", e);
            e
        })?,
        None => GraderSettings::default(),
    };

    let config = file_settings
        .merge(cli.settings()?)
        .into_runner_config(cli.working_dir.clone(), RunnerEnv::from_host())
        .context("Invalid grader configuration")?;

    info!(
        working_dir = %config.working_dir.display(),
        report = %config.report_location().display(),
        timeout_secs = config.timeout.as_secs(),
        "pytest-grader starting"
    );

    let test_name = config.test_name.clone();
    let result = executor::grade(config).await;

    emitter::emit(&result, &test_name, &OutputChannel::from_env())?;

    if !result.is_pass() {
        emitter::signal_failure(&result.message);
        std::process::exit(1);
    }

    Ok(())
}
