/// Grading Executor - High-Level Orchestration
///
/// **Responsibility:**
/// Run the pipeline `setup → run tests → read report → evaluate`.
///
/// **Architecture:**
/// 1. Engine prepares the environment and runs pytest (engine.rs)
/// 2. Report reader loads the JUnit XML (report.rs)
/// 3. Evaluator scores the report (evaluator.rs)
///
/// Every failure becomes an error `ScoreResult`, so the grading pipeline
/// always receives a payload.
use crate::engine::{self, RunOutcome};
use crate::evaluator;
use crate::report;
use grader_common::config::RunnerConfig;
use grader_common::error::GraderError;
use grader_common::types::ScoreResult;
use tracing::{error, info, warn};

/// Execute the pipeline, stopping at the first error
pub async fn execute(config: &RunnerConfig) -> Result<ScoreResult, GraderError> {
    engine::setup(config).await?;

    match engine::run_tests(config).await? {
        RunOutcome::Success => info!("Test command succeeded"),
        RunOutcome::ProcessError { message } => {
            // Failing tests exit non-zero; the report decides the score
            warn!(error = %message, "Test command exited with failure, grading from report");
        }
        RunOutcome::NoReport { message } => {
            return Err(GraderError::Run { detail: message });
        }
    }

    let report = report::read_report(&config.report_location())?;
    evaluator::evaluate(&report, config.max_score, config.partial_credit)
}

/// Grade one run; errors are folded into an error result
pub async fn grade(config: RunnerConfig) -> ScoreResult {
    info!(
        test_name = %config.test_name,
        command = %config.test_command(),
        max_score = config.max_score,
        partial_credit = config.partial_credit,
        "Starting grading run"
    );

    match execute(&config).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "{}", e.headline());
            ScoreResult::from_error(&e, config.max_score)
        }
    }
}
