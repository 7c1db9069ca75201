// Grader settings: config file, action inputs and defaults
use anyhow::{bail, Context, Result};
use grader_common::config::{RunnerConfig, RunnerEnv, DEFAULT_TIMEOUT_MINUTES};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// One layer of settings; unset fields fall through to the next layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct GraderSettings {
    pub test_name: Option<String>,
    pub test_class: Option<String>,
    pub test_dir: Option<String>,
    pub setup_command: Option<String>,
    /// Minutes
    pub timeout: Option<u64>,
    pub max_score: Option<f64>,
    pub partial_credit: Option<bool>,
    pub report_path: Option<PathBuf>,
    pub runner: Option<String>,
    pub install_dependencies: Option<bool>,
}

/// Empty strings count as unset, the way unset action inputs arrive
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse an optional textual input, treating blanks as unset
pub fn parse_input<T>(name: &str, value: Option<&str>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => match raw.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => bail!("Invalid value '{}' for {}: {}", raw, name, e),
        },
    }
}

/// Accepts true/false, yes/no, on/off and 1/0
pub fn parse_flag(name: &str, value: Option<&str>) -> Result<Option<bool>> {
    match value.map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("") => Ok(None),
        Some("true") | Some("yes") | Some("on") | Some("1") => Ok(Some(true)),
        Some("false") | Some("no") | Some("off") | Some("0") => Ok(Some(false)),
        Some(other) => bail!("Invalid value '{}' for {}: expected true or false", other, name),
    }
}

impl GraderSettings {
    /// Load settings from a JSON file
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Grader config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    /// Layer `overrides` on top of `self`
    pub fn merge(self, overrides: GraderSettings) -> GraderSettings {
        GraderSettings {
            test_name: non_empty(overrides.test_name).or(self.test_name),
            test_class: non_empty(overrides.test_class).or(self.test_class),
            test_dir: non_empty(overrides.test_dir).or(self.test_dir),
            setup_command: non_empty(overrides.setup_command).or(self.setup_command),
            timeout: overrides.timeout.or(self.timeout),
            max_score: overrides.max_score.or(self.max_score),
            partial_credit: overrides.partial_credit.or(self.partial_credit),
            report_path: overrides.report_path.or(self.report_path),
            runner: non_empty(overrides.runner).or(self.runner),
            install_dependencies: overrides.install_dependencies.or(self.install_dependencies),
        }
    }

    /// Fill in defaults and validate
    pub fn into_runner_config(self, working_dir: PathBuf, env: RunnerEnv) -> Result<RunnerConfig> {
        let defaults = RunnerConfig {
            working_dir,
            env,
            ..RunnerConfig::default()
        };

        let max_score = self.max_score.unwrap_or(defaults.max_score);
        if !max_score.is_finite() || max_score < 0.0 {
            bail!("max-score must be a non-negative number, got {}", max_score);
        }

        let timeout_minutes = self.timeout.unwrap_or(DEFAULT_TIMEOUT_MINUTES);
        if timeout_minutes == 0 {
            bail!("timeout must be at least 1 minute");
        }
        let timeout_secs = match timeout_minutes.checked_mul(60) {
            Some(secs) => secs,
            None => bail!("timeout of {} minutes is too large", timeout_minutes),
        };

        Ok(RunnerConfig {
            test_name: non_empty(self.test_name).unwrap_or(defaults.test_name),
            test_class: non_empty(self.test_class),
            test_dir: non_empty(self.test_dir),
            setup_command: non_empty(self.setup_command),
            timeout: Duration::from_secs(timeout_secs),
            max_score,
            partial_credit: self.partial_credit.unwrap_or(defaults.partial_credit),
            report_path: self.report_path.unwrap_or(defaults.report_path),
            runner: non_empty(self.runner).unwrap_or(defaults.runner),
            install_dependencies: self
                .install_dependencies
                .unwrap_or(defaults.install_dependencies),
            working_dir: defaults.working_dir,
            env: defaults.env,
        })
    }
}
