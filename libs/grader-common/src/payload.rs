use crate::types::{ResultStatus, ScoreResult};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Payload wire format - the contract with the grading pipeline
///
/// The payload is JSON, base64-encoded once. Inside it the Markdown summary
/// is base64-encoded on its own. `filename` and `line_no` are always empty,
/// the pipeline only reads them for per-test annotations.
pub const PAYLOAD_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("invalid payload json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload contains no test entry")]
    MissingTest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub version: u32,
    pub status: ResultStatus,
    pub max_score: f64,
    pub markdown: String,
    pub tests: Vec<PayloadTest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadTest {
    pub name: String,
    pub status: ResultStatus,
    pub message: String,
    pub score: f64,
    pub filename: String,
    pub line_no: u32,
    pub execution_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_code: Option<String>,
}

fn to_base64(text: &str) -> String {
    general_purpose::STANDARD.encode(text.as_bytes())
}

fn from_base64(text: &str) -> Result<String, PayloadError> {
    let bytes = general_purpose::STANDARD.decode(text.trim())?;
    Ok(String::from_utf8(bytes)?)
}

impl Payload {
    /// Wrap a result as the single test entry named `test_name`
    pub fn from_result(result: &ScoreResult, test_name: &str) -> Self {
        Self {
            version: PAYLOAD_VERSION,
            status: result.status,
            max_score: result.max_score,
            markdown: to_base64(&result.summary),
            tests: vec![PayloadTest {
                name: test_name.to_string(),
                status: result.status,
                message: result.message.clone(),
                score: result.computed_score,
                filename: String::new(),
                line_no: 0,
                execution_time: result.elapsed_seconds,
                test_code: result.test_code.clone(),
            }],
        }
    }

    pub fn encode(&self) -> Result<String, PayloadError> {
        let json = serde_json::to_string(self)?;
        Ok(to_base64(&json))
    }

    pub fn decode(encoded: &str) -> Result<Self, PayloadError> {
        let json = from_base64(encoded)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Recover the result carried by the first test entry
    pub fn into_result(self) -> Result<ScoreResult, PayloadError> {
        let summary = from_base64(&self.markdown)?;
        let test = self.tests.into_iter().next().ok_or(PayloadError::MissingTest)?;

        Ok(ScoreResult {
            status: self.status,
            max_score: self.max_score,
            computed_score: test.score,
            summary,
            elapsed_seconds: test.execution_time,
            message: test.message,
            test_code: test.test_code,
        })
    }
}
