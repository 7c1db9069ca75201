/// Report Reader - JUnit XML to TestReport
///
/// **Accepted layouts (pytest `--junitxml`):**
/// - `<testsuites>` wrapping one or more `<testsuite>` elements
/// - a bare `<testsuite>` root (older pytest releases)
///
/// Counts are taken from the suite attributes and summed across suites.
/// Per-case outcomes come from the `<failure>`, `<error>` and `<skipped>`
/// children of each `<testcase>`.
use grader_common::error::GraderError;
use grader_common::types::{Outcome, TestCase, TestReport};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RawSuites {
    #[serde(rename = "testsuite", default)]
    suites: Vec<RawSuite>,
}

#[derive(Debug, Deserialize)]
struct RawSuite {
    #[serde(rename = "@tests")]
    tests: u32,
    #[serde(rename = "@failures", default)]
    failures: u32,
    #[serde(rename = "@errors", default)]
    errors: u32,
    #[serde(rename = "@skipped", default)]
    skipped: u32,
    #[serde(rename = "@time", default)]
    time: f64,
    #[serde(rename = "testcase", default)]
    cases: Vec<RawCase>,
}

#[derive(Debug, Deserialize)]
struct RawCase {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@classname", default)]
    classname: Option<String>,
    #[serde(default)]
    failure: Option<RawProblem>,
    #[serde(default)]
    error: Option<RawProblem>,
    #[serde(default)]
    skipped: Option<RawProblem>,
}

#[derive(Debug, Deserialize)]
struct RawProblem {
    #[serde(rename = "@message", default)]
    message: Option<String>,
    #[serde(rename = "$text", default)]
    text: Option<String>,
}

impl RawProblem {
    /// `message` attribute, else the first non-empty line of the body
    fn into_message(self) -> Option<String> {
        self.message.filter(|m| !m.trim().is_empty()).or_else(|| {
            self.text.and_then(|text| {
                text.lines()
                    .map(str::trim)
                    .find(|line| !line.is_empty())
                    .map(str::to_string)
            })
        })
    }
}

impl From<RawCase> for TestCase {
    fn from(raw: RawCase) -> Self {
        let (outcome, problem) = if let Some(p) = raw.failure {
            (Outcome::Failed, Some(p))
        } else if let Some(p) = raw.error {
            (Outcome::Errored, Some(p))
        } else if let Some(p) = raw.skipped {
            (Outcome::Skipped, Some(p))
        } else {
            (Outcome::Passed, None)
        };

        let message = problem.map(|p| p.into_message().unwrap_or_else(|| outcome.to_string()));

        TestCase {
            name: raw.name,
            classname: raw.classname,
            outcome,
            message,
        }
    }
}

fn parse_error(path: &Path, detail: impl ToString) -> GraderError {
    GraderError::Parse {
        path: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Local name of the first element in the document, if any
fn root_element(xml: &str) -> Result<Option<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                return Ok(Some(
                    String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                ));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

fn add_count(path: &Path, name: &str, sum: u32, value: u32) -> Result<u32, GraderError> {
    sum.checked_add(value)
        .ok_or_else(|| parse_error(path, format!("`{}` count overflows across suites", name)))
}

/// Parse report text; `path` is only used for error messages
pub fn parse_report(xml: &str, path: &Path) -> Result<TestReport, GraderError> {
    let root = root_element(xml).map_err(|e| parse_error(path, e))?;

    let suites = match root.as_deref() {
        Some("testsuites") => {
            quick_xml::de::from_str::<RawSuites>(xml)
                .map_err(|e| parse_error(path, e))?
                .suites
        }
        Some("testsuite") => {
            vec![quick_xml::de::from_str::<RawSuite>(xml).map_err(|e| parse_error(path, e))?]
        }
        Some(other) => {
            return Err(parse_error(
                path,
                format!("unexpected root element <{}>", other),
            ))
        }
        None => return Err(parse_error(path, "document has no root element")),
    };

    let mut report = TestReport {
        total: 0,
        failed: 0,
        errored: 0,
        skipped: 0,
        elapsed_seconds: 0.0,
        cases: Vec::new(),
    };

    for suite in suites {
        report.total = add_count(path, "tests", report.total, suite.tests)?;
        report.failed = add_count(path, "failures", report.failed, suite.failures)?;
        report.errored = add_count(path, "errors", report.errored, suite.errors)?;
        report.skipped = add_count(path, "skipped", report.skipped, suite.skipped)?;
        report.elapsed_seconds += suite.time;
        report.cases.extend(suite.cases.into_iter().map(TestCase::from));
    }

    // A test that fails and then errors in teardown is counted under both
    // failures and errors, so only each count on its own is bounded by total.
    for (name, count) in [
        ("failures", report.failed),
        ("errors", report.errored),
        ("skipped", report.skipped),
    ] {
        if count > report.total {
            return Err(parse_error(
                path,
                format!("report counts {} {} but only {} tests", count, name, report.total),
            ));
        }
    }

    debug!(
        total = report.total,
        failed = report.failed,
        errored = report.errored,
        skipped = report.skipped,
        cases = report.cases.len(),
        elapsed_seconds = report.elapsed_seconds,
        "Parsed test report"
    );

    Ok(report)
}

/// Load the report document at `path`
pub fn read_report(path: &Path) -> Result<TestReport, GraderError> {
    if !path.exists() {
        return Err(GraderError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let data = fs::read_to_string(path)
        .map_err(|e| GraderError::io(format!("Failed to read {}", path.display()), e))?;

    parse_report(&data, path)
}
