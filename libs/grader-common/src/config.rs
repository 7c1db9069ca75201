// Runner configuration shared by the grading pipeline
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_REPORT_PATH: &str = ".unittest-results.xml";
pub const DEFAULT_RUNNER: &str = "python -m pytest";
pub const DEFAULT_TEST_NAME: &str = "Unknown test";
pub const DEFAULT_TIMEOUT_MINUTES: u64 = 10;

/// Environment handed to every subprocess
///
/// Subprocesses start from an empty environment and only see these
/// variables, so the host's environment cannot leak into a student run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerEnv {
    vars: BTreeMap<String, String>,
}

impl RunnerEnv {
    /// Fixed variables plus `PATH` and `HOME` when given
    pub fn new(path: Option<String>, home: Option<String>) -> Self {
        let mut vars = BTreeMap::new();
        vars.insert("FORCE_COLOR".to_string(), "true".to_string());
        vars.insert("DOTNET_CLI_HOME".to_string(), "/tmp".to_string());
        vars.insert("DOTNET_NOLOGO".to_string(), "true".to_string());
        if let Some(path) = path {
            vars.insert("PATH".to_string(), path);
        }
        if let Some(home) = home {
            vars.insert("HOME".to_string(), home);
        }
        Self { vars }
    }

    /// Snapshot `PATH` and `HOME` from the current process
    pub fn from_host() -> Self {
        Self::new(std::env::var("PATH").ok(), std::env::var("HOME").ok())
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for RunnerEnv {
    fn default() -> Self {
        Self::from_host()
    }
}

/// Everything one grading run needs, passed by value into the pipeline
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub test_name: String,
    pub test_class: Option<String>,
    pub test_dir: Option<String>,
    pub setup_command: Option<String>,
    pub timeout: Duration,
    pub max_score: f64,
    pub partial_credit: bool,
    /// Report location, relative to `working_dir` unless absolute
    pub report_path: PathBuf,
    /// Test command prefix, e.g. `python -m pytest`
    pub runner: String,
    pub install_dependencies: bool,
    pub working_dir: PathBuf,
    pub env: RunnerEnv,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            test_name: DEFAULT_TEST_NAME.to_string(),
            test_class: None,
            test_dir: None,
            setup_command: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_MINUTES * 60),
            max_score: 0.0,
            partial_credit: false,
            report_path: PathBuf::from(DEFAULT_REPORT_PATH),
            runner: DEFAULT_RUNNER.to_string(),
            install_dependencies: true,
            working_dir: PathBuf::from("."),
            env: RunnerEnv::default(),
        }
    }
}

impl RunnerConfig {
    /// Test selection passed to the runner: `<dir>/<class>`, `<class>` or nothing
    pub fn test_target(&self) -> Option<String> {
        let class = self.test_class.as_deref().filter(|c| !c.is_empty())?;
        match self.test_dir.as_deref().filter(|d| !d.is_empty()) {
            Some(dir) => Some(format!("{}/{}", dir.trim_end_matches('/'), class)),
            None => Some(class.to_string()),
        }
    }

    /// Full shell command that runs the tests and writes the report
    pub fn test_command(&self) -> String {
        let mut command = self.runner.clone();
        if let Some(target) = self.test_target() {
            command.push(' ');
            command.push_str(&target);
        }
        command.push_str(&format!(" --junitxml={}", self.report_path.display()));
        command
    }

    /// Absolute or working-dir relative report location
    pub fn report_location(&self) -> PathBuf {
        resolve(&self.working_dir, &self.report_path)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_env_fixed_vars() {
        let env = RunnerEnv::new(Some("/usr/bin".to_string()), None);
        assert_eq!(env.get("FORCE_COLOR"), Some("true"));
        assert_eq!(env.get("DOTNET_CLI_HOME"), Some("/tmp"));
        assert_eq!(env.get("DOTNET_NOLOGO"), Some("true"));
        assert_eq!(env.get("PATH"), Some("/usr/bin"));
        assert_eq!(env.get("HOME"), None);
    }

    #[test]
    fn test_command_without_class_runs_everything() {
        let config = RunnerConfig::default();
        assert_eq!(config.test_target(), None);
        assert_eq!(
            config.test_command(),
            "python -m pytest --junitxml=.unittest-results.xml"
        );
    }

    #[test]
    fn test_command_with_class_and_dir() {
        let config = RunnerConfig {
            test_class: Some("test_calc.py".to_string()),
            test_dir: Some("tests/".to_string()),
            ..RunnerConfig::default()
        };
        assert_eq!(config.test_target().as_deref(), Some("tests/test_calc.py"));
        assert_eq!(
            config.test_command(),
            "python -m pytest tests/test_calc.py --junitxml=.unittest-results.xml"
        );
    }

    #[test]
    fn test_dir_ignored_without_class() {
        let config = RunnerConfig {
            test_dir: Some("tests".to_string()),
            test_class: Some(String::new()),
            ..RunnerConfig::default()
        };
        assert_eq!(config.test_target(), None);
    }

    #[test]
    fn test_report_location_relative_to_working_dir() {
        let config = RunnerConfig {
            working_dir: PathBuf::from("/work"),
            ..RunnerConfig::default()
        };
        assert_eq!(
            config.report_location(),
            PathBuf::from("/work/.unittest-results.xml")
        );

        let absolute = RunnerConfig {
            report_path: PathBuf::from("/tmp/report.xml"),
            ..RunnerConfig::default()
        };
        assert_eq!(absolute.report_location(), PathBuf::from("/tmp/report.xml"));
    }
}
