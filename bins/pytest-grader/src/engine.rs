/// Execution Engine - Environment Setup and Test Invocation
///
/// **Core Responsibility:**
/// Prepare the Python environment and run the test command that writes the
/// report document.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to run pip, the setup command and pytest
/// - Engine does NOT read the report
/// - Engine does NOT score anything
///
/// A failing test command is expected when tests fail, so the exit status
/// alone never decides the outcome. Whether a report was written does.
use grader_common::config::RunnerConfig;
use grader_common::error::{GraderError, SetupStep};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

const PIP_INSTALL_PYTEST: &str = "pip install pytest";
const PIP_INSTALL_REQUIREMENTS: &str = "pip install -r requirements.txt";

/// Outcome of a test invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Runner exited cleanly and wrote a report
    Success,
    /// Runner failed or timed out but still wrote a report
    ProcessError { message: String },
    /// No report was written
    NoReport { message: String },
}

/// Raw result of one shell command
#[derive(Debug)]
pub struct CommandOutput {
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.map(|s| s.success()).unwrap_or(false)
    }

    /// Error text in the style of a failed `execSync`: command, status, stderr
    pub fn failure_message(&self, command: &str, timeout: Option<Duration>) -> String {
        let mut message = if self.timed_out {
            format!(
                "Command timed out after {}s: {}",
                timeout.map(|t| t.as_secs()).unwrap_or_default(),
                command
            )
        } else {
            match self.status.and_then(|s| s.code()) {
                Some(code) => format!("Command failed: {} (exit status {})", command, code),
                None => format!("Command failed: {} (terminated by signal)", command),
            }
        };

        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            message.push('\n');
            message.push_str(stderr);
        }
        message
    }
}

/// SIGKILL every process in the group led by `pid`
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    if let Some(pgid) = pid.and_then(|p| i32::try_from(p).ok()) {
        // Negative pid addresses the process group
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Run `command` through `sh -c` inside the configured working directory
///
/// The child only sees the variables in `config.env`. It leads its own
/// process group; when `timeout` elapses the whole group is killed, so a
/// runner started by the shell cannot outlive it, and `timed_out` is set.
pub async fn run_shell(
    command: &str,
    config: &RunnerConfig,
    timeout: Option<Duration>,
) -> std::io::Result<CommandOutput> {
    debug!(command, working_dir = %config.working_dir.display(), "Spawning command");

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(&config.working_dir)
        .env_clear()
        .envs(config.env.vars())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let start = Instant::now();
    let child = cmd.spawn()?;
    let pid = child.id();

    let output = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(output) => Some(output?),
            Err(_) => {
                warn!(command, pid, "Command timed out, killing process group");
                kill_process_group(pid);
                None
            }
        },
        None => Some(child.wait_with_output().await?),
    };

    let elapsed = start.elapsed();
    Ok(match output {
        Some(output) => CommandOutput {
            status: Some(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            timed_out: false,
            elapsed,
        },
        None => CommandOutput {
            status: None,
            stdout: String::new(),
            stderr: String::new(),
            timed_out: true,
            elapsed,
        },
    })
}

async fn run_setup_step(
    step: SetupStep,
    command: &str,
    config: &RunnerConfig,
) -> Result<(), GraderError> {
    info!(command, "Running setup step");

    let output = run_shell(command, config, None)
        .await
        .map_err(|e| GraderError::Setup {
            step,
            command: command.to_string(),
            detail: e.to_string(),
        })?;

    if !output.success() {
        let detail = output.failure_message(command, None);
        warn!(command, error = %detail, "{}", step);
        return Err(GraderError::Setup {
            step,
            command: command.to_string(),
            detail,
        });
    }

    debug!(command, elapsed_ms = output.elapsed.as_millis() as u64, "Setup step finished");
    Ok(())
}

/// Install pytest, the project's requirements and run the setup command
///
/// Stops at the first failing step.
pub async fn setup(config: &RunnerConfig) -> Result<(), GraderError> {
    if config.install_dependencies {
        run_setup_step(SetupStep::InstallPytest, PIP_INSTALL_PYTEST, config).await?;

        if config.working_dir.join("requirements.txt").exists() {
            run_setup_step(
                SetupStep::InstallRequirements,
                PIP_INSTALL_REQUIREMENTS,
                config,
            )
            .await?;
        } else {
            debug!("No requirements.txt, skipping requirements install");
        }
    }

    if let Some(command) = config.setup_command.as_deref().filter(|c| !c.trim().is_empty()) {
        run_setup_step(SetupStep::SetupCommand, command, config).await?;
    }

    Ok(())
}

/// Run the test command and classify the outcome by the report it left behind
pub async fn run_tests(config: &RunnerConfig) -> Result<RunOutcome, GraderError> {
    let report = config.report_location();

    match tokio::fs::remove_file(&report).await {
        Ok(()) => debug!(path = %report.display(), "Removed stale report"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(GraderError::io(
                format!("Failed to remove stale report {}", report.display()),
                e,
            ))
        }
    }

    let command = config.test_command();
    info!(
        command = %command,
        timeout_secs = config.timeout.as_secs(),
        "Running tests"
    );

    let failure = match run_shell(&command, config, Some(config.timeout)).await {
        Ok(output) => {
            info!(
                exit_code = output.status.and_then(|s| s.code()),
                timed_out = output.timed_out,
                elapsed_ms = output.elapsed.as_millis() as u64,
                "Test command finished"
            );
            if !output.stdout.trim().is_empty() {
                debug!(stdout = %output.stdout, "Test command output");
            }
            if output.success() {
                None
            } else {
                Some(output.failure_message(&command, Some(config.timeout)))
            }
        }
        Err(e) => Some(format!("Failed to spawn test command: {}", e)),
    };

    let has_report = tokio::fs::try_exists(&report).await.unwrap_or(false);

    Ok(match (has_report, failure) {
        (true, None) => RunOutcome::Success,
        (true, Some(message)) => RunOutcome::ProcessError { message },
        (false, message) => RunOutcome::NoReport {
            message: message.unwrap_or_else(|| {
                format!("Test command did not write {}", report.display())
            }),
        },
    })
}
