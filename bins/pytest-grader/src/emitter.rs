// Result emission on the GitHub Actions output channel
use anyhow::{Context, Result};
use grader_common::payload::Payload;
use grader_common::types::ScoreResult;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

pub const OUTPUT_NAME: &str = "result";

/// Where step outputs go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputChannel {
    /// File named by `GITHUB_OUTPUT`
    GithubOutput(PathBuf),
    Stdout,
}

impl OutputChannel {
    pub fn from_env() -> Self {
        match std::env::var("GITHUB_OUTPUT") {
            Ok(path) if !path.is_empty() => OutputChannel::GithubOutput(PathBuf::from(path)),
            _ => OutputChannel::Stdout,
        }
    }
}

/// `name<<DELIM` block, the multiline form the runner accepts
fn write_output_block<W: Write>(writer: &mut W, name: &str, value: &str) -> io::Result<()> {
    let delimiter = format!("ghadelimiter_{}", Uuid::new_v4());
    write!(writer, "{}<<{}\n{}\n{}\n", name, delimiter, value, delimiter)
}

pub fn set_output(channel: &OutputChannel, name: &str, value: &str) -> Result<()> {
    match channel {
        OutputChannel::GithubOutput(path) => {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open output file {}", path.display()))?;
            write_output_block(&mut file, name, value)
                .with_context(|| format!("Failed to write output file {}", path.display()))?;
        }
        OutputChannel::Stdout => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}={}", name, value).context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

/// Encode `result` and publish it once; returns the encoded payload
pub fn emit(result: &ScoreResult, test_name: &str, channel: &OutputChannel) -> Result<String> {
    let encoded = Payload::from_result(result, test_name)
        .encode()
        .context("Failed to encode result payload")?;

    set_output(channel, OUTPUT_NAME, &encoded)?;

    info!(
        status = %result.status,
        score = result.computed_score,
        max_score = result.max_score,
        bytes = encoded.len(),
        "Result emitted"
    );

    Ok(encoded)
}

/// Workflow-command escaping for annotation text
fn escape_data(text: &str) -> String {
    text.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

pub fn error_annotation(message: &str) -> String {
    format!("::error::{}", escape_data(message))
}

/// Mark the step as failed; the caller still has to exit non-zero
pub fn signal_failure(message: &str) {
    println!("{}", error_annotation(message));
}

#[cfg(test)]
mod tests {
    use super::*;
    use grader_common::payload::Payload;
    use grader_common::types::ResultStatus;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn sample_result() -> ScoreResult {
        ScoreResult {
            status: ResultStatus::Pass,
            max_score: 10.0,
            computed_score: 10.0,
            summary: "All passed".to_string(),
            elapsed_seconds: 0.3,
            message: String::new(),
            test_code: None,
        }
    }

    #[test]
    fn test_output_block_format() {
        let mut buffer = Vec::new();
        write_output_block(&mut buffer, "result", "abc=").unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);

        let delimiter = lines[0].strip_prefix("result<<").unwrap();
        assert!(delimiter.starts_with("ghadelimiter_"));
        assert_eq!(lines[1], "abc=");
        assert_eq!(lines[2], delimiter);
    }

    #[test]
    fn test_emit_appends_to_github_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("github_output");
        fs::write(&path, "previous=1\n").unwrap();
        let channel = OutputChannel::GithubOutput(path.clone());

        let encoded = emit(&sample_result(), "unit tests", &channel).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("previous=1\nresult<<ghadelimiter_"));
        assert!(content.contains(&format!("\n{}\n", encoded)));

        let result = Payload::decode(&encoded).unwrap().into_result().unwrap();
        assert_eq!(result, sample_result());
    }

    #[test]
    fn test_error_annotation_escapes_newlines() {
        assert_eq!(
            error_annotation("Failed to run tests: 100% broken\nsee log"),
            "::error::Failed to run tests: 100%25 broken%0Asee log"
        );
    }
}
