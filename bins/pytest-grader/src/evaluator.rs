/// Test Evaluator - Report Normalization and Scoring
///
/// **Core Responsibility:**
/// Turn a parsed test report into a score and a Markdown summary.
///
/// **Critical Properties:**
/// - Knows nothing about pytest invocation
/// - Knows nothing about the output channel
/// - Pure function: (report, max score, partial credit) → ScoreResult
///
/// **Scoring Rules:**
/// - problems = failed + errored + skipped, capped at total
/// - no problems: full `max_score`
/// - partial credit: `max_score - (max_score / total) * problems`, clamped to `[0, max_score]`
/// - otherwise: 0
use grader_common::error::GraderError;
use grader_common::types::{ResultStatus, ScoreResult, TestReport};
use tracing::{debug, info};

/// Score for a report with at least one test
pub fn compute_score(report: &TestReport, max_score: f64, partial_credit: bool) -> f64 {
    let problems = report.problem_count();

    if problems == 0 {
        return max_score;
    }
    if !partial_credit {
        return 0.0;
    }

    let per_test = max_score / f64::from(report.total);
    let score = max_score - per_test * f64::from(problems);
    score.max(0.0).min(max_score)
}

/// First line of the summary
pub fn headline(report: &TestReport) -> String {
    let problems = report.problem_count();

    if problems == 0 {
        "All passed".to_string()
    } else if problems >= report.total {
        "All failed".to_string()
    } else {
        format!("{} of {} failed", problems, report.total)
    }
}

/// Keep a table cell on one line
fn escape_cell(text: &str) -> String {
    text.replace('\r', "")
        .replace('|', "\\|")
        .replace('\n', "<br>")
}

/// Markdown table of every non-passing case, empty when all passed
pub fn failure_table(report: &TestReport) -> String {
    let rows: Vec<String> = report
        .problem_cases()
        .map(|case| {
            format!(
                "| {} | {} |",
                escape_cell(&case.name),
                escape_cell(case.message.as_deref().unwrap_or_default())
            )
        })
        .collect();

    if rows.is_empty() {
        return String::new();
    }

    format!("| Test | Failure |\n| --- | --- |\n{}\n", rows.join("\n"))
}

pub fn summarize(report: &TestReport) -> String {
    let table = failure_table(report);
    if table.is_empty() {
        headline(report)
    } else {
        format!("{}\n\n{}", headline(report), table)
    }
}

/// Evaluate a report and produce the final result
///
/// ## Errors
/// `GraderError::NoTests` when the report contains no tests.
pub fn evaluate(
    report: &TestReport,
    max_score: f64,
    partial_credit: bool,
) -> Result<ScoreResult, GraderError> {
    if report.total == 0 {
        return Err(GraderError::NoTests);
    }

    let computed_score = compute_score(report, max_score, partial_credit);

    for case in report.problem_cases() {
        debug!(
            test = %case.name,
            classname = case.classname.as_deref().unwrap_or_default(),
            outcome = %case.outcome,
            message = case.message.as_deref().unwrap_or_default(),
            "Test did not pass"
        );
    }

    info!(
        total = report.total,
        problems = report.problem_count(),
        score = computed_score,
        max_score,
        partial_credit,
        "{}",
        headline(report)
    );

    Ok(ScoreResult {
        status: ResultStatus::Pass,
        max_score,
        computed_score,
        summary: summarize(report),
        elapsed_seconds: report.elapsed_seconds,
        message: String::new(),
        test_code: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use grader_common::types::{Outcome, TestCase};

    /// Helper to create a report from counts, with one case per test
    fn make_report(total: u32, failed: u32, errored: u32, skipped: u32) -> TestReport {
        let mut cases = Vec::new();
        let outcomes = std::iter::repeat(Outcome::Failed)
            .take(failed as usize)
            .chain(std::iter::repeat(Outcome::Errored).take(errored as usize))
            .chain(std::iter::repeat(Outcome::Skipped).take(skipped as usize));
        for (idx, outcome) in outcomes.enumerate() {
            cases.push(TestCase {
                name: format!("test_{}", idx),
                classname: Some("test_module".to_string()),
                outcome,
                message: Some(format!("{} #{}", outcome, idx)),
            });
        }
        while cases.len() < total as usize {
            cases.push(TestCase {
                name: format!("test_{}", cases.len()),
                classname: None,
                outcome: Outcome::Passed,
                message: None,
            });
        }

        TestReport {
            total,
            failed,
            errored,
            skipped,
            elapsed_seconds: 0.42,
            cases,
        }
    }

    #[test]
    fn test_partial_credit_two_of_ten() {
        let report = make_report(10, 2, 0, 0);

        let result = evaluate(&report, 100.0, true).unwrap();

        assert_eq!(result.computed_score, 80.0);
        assert_eq!(result.status, ResultStatus::Pass);
        assert!(result.summary.starts_with("2 of 10 failed"));
        assert_eq!(result.elapsed_seconds, 0.42);
    }

    #[test]
    fn test_all_passed_gets_max_score() {
        let report = make_report(5, 0, 0, 0);

        let result = evaluate(&report, 50.0, false).unwrap();

        assert_eq!(result.computed_score, 50.0);
        assert_eq!(result.status, ResultStatus::Pass);
        assert_eq!(result.summary, "All passed");
        assert!(result.message.is_empty());
    }

    #[test]
    fn test_all_failed_marker() {
        for (failed, errored, skipped) in [(3, 0, 0), (1, 1, 1), (0, 0, 3)] {
            let report = make_report(3, failed, errored, skipped);
            let result = evaluate(&report, 30.0, true).unwrap();

            assert!(result.summary.starts_with("All failed"));
            assert_eq!(result.computed_score, 0.0);
            assert_eq!(result.status, ResultStatus::Pass);
        }
    }

    #[test]
    fn test_no_partial_credit_collapses_to_zero() {
        let report = make_report(10, 1, 0, 0);
        assert_eq!(compute_score(&report, 100.0, false), 0.0);

        let report = make_report(10, 0, 0, 9);
        assert_eq!(compute_score(&report, 100.0, false), 0.0);
    }

    #[test]
    fn test_partial_credit_strictly_decreasing() {
        let total = 7;
        let mut previous = f64::INFINITY;
        for problems in 0..=total {
            let report = make_report(total, problems, 0, 0);
            let score = compute_score(&report, 10.0, true);

            assert!(score < previous, "score must drop at {} problems", problems);
            assert!(score >= 0.0);
            assert!(score <= 10.0);
            previous = score;
        }
    }

    #[test]
    fn test_errors_and_skips_count_as_problems() {
        let report = make_report(4, 1, 1, 1);
        assert_eq!(compute_score(&report, 8.0, true), 2.0);
        assert_eq!(headline(&report), "3 of 4 failed");
    }

    #[test]
    fn test_failure_with_teardown_error_counts_once() {
        // One test, reported under both failures and errors
        let report = make_report(1, 1, 1, 0);

        let result = evaluate(&report, 10.0, true).unwrap();

        assert_eq!(result.computed_score, 0.0);
        assert!(result.summary.starts_with("All failed"));
    }

    #[test]
    fn test_no_tests_is_an_error() {
        let report = make_report(0, 0, 0, 0);
        let err = evaluate(&report, 10.0, true).unwrap_err();
        assert!(matches!(err, GraderError::NoTests));
    }

    #[test]
    fn test_summary_lists_every_problem_case() {
        let report = make_report(4, 1, 1, 0);

        let summary = summarize(&report);

        assert_eq!(
            summary,
            "2 of 4 failed\n\n| Test | Failure |\n| --- | --- |\n| test_0 | failed #0 |\n| test_1 | errored #1 |\n"
        );
    }

    #[test]
    fn test_table_cells_stay_on_one_row() {
        let mut report = make_report(2, 1, 0, 0);
        report.cases[0].message = Some("assert a | b\nwhere a = 1\r\n".to_string());

        let table = failure_table(&report);

        assert!(table.contains("| test_0 | assert a \\| b<br>where a = 1<br> |"));
        assert_eq!(table.lines().count(), 3);
    }

    #[test]
    fn test_failure_table_empty_when_all_passed() {
        let report = make_report(3, 0, 0, 0);
        assert!(failure_table(&report).is_empty());
    }
}
