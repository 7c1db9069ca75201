use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Environment preparation step that runs before the tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    InstallPytest,
    InstallRequirements,
    SetupCommand,
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupStep::InstallPytest => write!(f, "Failed to install pytest"),
            SetupStep::InstallRequirements => {
                write!(f, "Failed to install requirements from requirements.txt")
            }
            SetupStep::SetupCommand => write!(f, "Failed to run setup command"),
        }
    }
}

/// Terminal failures of a grading run
///
/// None of these are retried. Each one still yields a well-formed payload
/// with `status: error` (see `ScoreResult::from_error`).
#[derive(Debug, Error)]
pub enum GraderError {
    #[error("{step}: {detail}")]
    Setup {
        step: SetupStep,
        command: String,
        detail: String,
    },

    #[error("Failed to run tests{}", with_detail(.detail))]
    Run { detail: String },

    #[error("No tests found")]
    NoTests,

    #[error("File not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to parse {}: {detail}", .path.display())]
    Parse { path: PathBuf, detail: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

fn with_detail(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(": {}", detail)
    }
}

impl GraderError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        GraderError::Io {
            context: context.into(),
            source,
        }
    }

    /// Short description used as the bold line of the error summary
    pub fn headline(&self) -> String {
        match self {
            GraderError::Setup { step, .. } => step.to_string(),
            GraderError::Run { .. } => "Failed to run tests".to_string(),
            GraderError::NoTests => "No tests found".to_string(),
            GraderError::NotFound { .. } | GraderError::Parse { .. } => {
                "Failed to read test results".to_string()
            }
            GraderError::Io { context, .. } => context.clone(),
        }
    }

    /// Raw error text, embedded verbatim in the summary
    pub fn detail(&self) -> Option<String> {
        let detail = match self {
            GraderError::Setup { detail, .. } | GraderError::Run { detail } => detail.clone(),
            GraderError::NoTests => return None,
            GraderError::NotFound { .. } | GraderError::Parse { .. } => self.to_string(),
            GraderError::Io { source, .. } => source.to_string(),
        };
        if detail.is_empty() {
            None
        } else {
            Some(detail)
        }
    }

    pub fn test_code(&self) -> Option<&str> {
        match self {
            GraderError::Setup { command, .. } => Some(command),
            _ => None,
        }
    }
}
