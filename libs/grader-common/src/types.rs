use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GraderError;

/// Outcome of a single test case as recorded in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
    Errored,
    Skipped,
}

impl Outcome {
    pub fn is_problem(&self) -> bool {
        !matches!(self, Outcome::Passed)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Passed => write!(f, "passed"),
            Outcome::Failed => write!(f, "failed"),
            Outcome::Errored => write!(f, "errored"),
            Outcome::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub classname: Option<String>,
    pub outcome: Outcome,
    /// Present for every outcome except `Passed`
    pub message: Option<String>,
}

/// In-memory view of one runner report
///
/// Counts come from the suite attributes, cases from the `<testcase>`
/// elements. The reader guarantees each of `failed`, `errored` and `skipped`
/// is at most `total`; their sum may exceed it when a test both fails and
/// errors in teardown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub total: u32,
    pub failed: u32,
    pub errored: u32,
    pub skipped: u32,
    pub elapsed_seconds: f64,
    pub cases: Vec<TestCase>,
}

impl TestReport {
    /// Number of tests that did not pass (failed, errored or skipped),
    /// never more than `total`
    pub fn problem_count(&self) -> u32 {
        let problems = u64::from(self.failed) + u64::from(self.errored) + u64::from(self.skipped);
        u32::try_from(problems.min(u64::from(self.total))).unwrap_or(self.total)
    }

    pub fn problem_cases(&self) -> impl Iterator<Item = &TestCase> {
        self.cases.iter().filter(|case| case.outcome.is_problem())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Pass,
    Error,
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultStatus::Pass => write!(f, "pass"),
            ResultStatus::Error => write!(f, "error"),
        }
    }
}

/// Normalized outcome of a grading run, ready to be emitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub status: ResultStatus,
    pub max_score: f64,
    pub computed_score: f64,
    /// Markdown summary shown to the student
    pub summary: String,
    pub elapsed_seconds: f64,
    /// Error text; empty for a successful run
    pub message: String,
    /// Command that failed during setup, if any
    pub test_code: Option<String>,
}

impl ScoreResult {
    /// Build the best-effort result for a run that never produced a score
    pub fn from_error(error: &GraderError, max_score: f64) -> Self {
        let mut summary = format!("**Error:** {}", error.headline());
        if let Some(detail) = error.detail() {
            summary.push_str(&format!("\n\n```\n{}\n```", detail));
        }

        Self {
            status: ResultStatus::Error,
            max_score,
            computed_score: 0.0,
            summary,
            elapsed_seconds: 0.0,
            message: error.to_string(),
            test_code: error.test_code().map(str::to_string),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.status == ResultStatus::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SetupStep;

    fn make_case(name: &str, outcome: Outcome) -> TestCase {
        TestCase {
            name: name.to_string(),
            classname: None,
            outcome,
            message: None,
        }
    }

    #[test]
    fn test_problem_count_sums_all_non_passing_kinds() {
        let report = TestReport {
            total: 10,
            failed: 2,
            errored: 1,
            skipped: 3,
            elapsed_seconds: 0.5,
            cases: vec![],
        };
        assert_eq!(report.problem_count(), 6);
    }

    #[test]
    fn test_problem_count_capped_at_total() {
        let report = TestReport {
            total: 1,
            failed: 1,
            errored: 1,
            skipped: 0,
            elapsed_seconds: 0.0,
            cases: vec![],
        };
        assert_eq!(report.problem_count(), 1);

        let huge = TestReport {
            total: u32::MAX,
            failed: u32::MAX,
            errored: u32::MAX,
            skipped: u32::MAX,
            elapsed_seconds: 0.0,
            cases: vec![],
        };
        assert_eq!(huge.problem_count(), u32::MAX);
    }

    #[test]
    fn test_problem_cases_keeps_report_order() {
        let report = TestReport {
            total: 4,
            failed: 1,
            errored: 0,
            skipped: 1,
            elapsed_seconds: 0.0,
            cases: vec![
                make_case("test_a", Outcome::Passed),
                make_case("test_b", Outcome::Skipped),
                make_case("test_c", Outcome::Passed),
                make_case("test_d", Outcome::Failed),
            ],
        };

        let names: Vec<&str> = report.problem_cases().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["test_b", "test_d"]);
    }

    #[test]
    fn test_from_error_no_tests() {
        let result = ScoreResult::from_error(&GraderError::NoTests, 25.0);

        assert_eq!(result.status, ResultStatus::Error);
        assert_eq!(result.computed_score, 0.0);
        assert_eq!(result.max_score, 25.0);
        assert_eq!(result.message, "No tests found");
        assert_eq!(result.summary, "**Error:** No tests found");
        assert!(result.test_code.is_none());
    }

    #[test]
    fn test_from_error_setup_embeds_raw_detail() {
        let error = GraderError::Setup {
            step: SetupStep::SetupCommand,
            command: "make deps".to_string(),
            detail: "make: *** No rule to make target 'deps'".to_string(),
        };
        let result = ScoreResult::from_error(&error, 10.0);

        assert_eq!(
            result.summary,
            "**Error:** Failed to run setup command\n\n```\nmake: *** No rule to make target 'deps'\n```"
        );
        assert_eq!(result.test_code.as_deref(), Some("make deps"));
        assert!(!result.is_pass());
    }
}
