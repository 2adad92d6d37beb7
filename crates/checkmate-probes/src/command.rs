//! Local command checks
//!
//! Runs `sh -c <command>` once per attempt. Exit code 0 passes. The child is
//! killed when the per-command timeout fires or the session is abandoned.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use checkmate_core::retry::{Attempt, RetryWindow, TracingObserver, Verdict};
use checkmate_core::{Diagnostics, RetryPolicy, RetryResult};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::{CheckError, Result};
use crate::outcome::{conclude, record_fatal};

/// Environment variable holding the absolute path of the created file
pub const FILEPATH_ENV: &str = "CHECKMATE_FILEPATH";

fn default_working_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_command_timeout() -> u64 {
    5000
}

fn default_timeout() -> u64 {
    10000
}

fn default_interval() -> u64 {
    200
}

fn default_consecutive_successes() -> u32 {
    1
}

/// A file written once before the first attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFileSpec {
    #[serde(default)]
    pub contents: String,

    /// Name prefix; with `use_working_dir`, directory components place the
    /// file below the working directory
    #[serde(default)]
    pub name: String,

    /// Create the file in the working directory instead of the temp directory
    #[serde(default)]
    pub use_working_dir: bool,

    /// Create missing parent directories
    #[serde(default)]
    pub create_directory: bool,
}

/// Configuration for a local command check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub command: String,

    #[serde(default = "default_working_directory")]
    pub working_directory: PathBuf,

    /// Timeout for a single run of the command, in milliseconds
    #[serde(default = "default_command_timeout")]
    pub command_timeout: u64,

    /// Added to the inherited environment
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub create_file: Option<CreateFileSpec>,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_interval")]
    pub interval: u64,

    #[serde(default = "default_consecutive_successes")]
    pub consecutive_successes: u32,

    #[serde(default)]
    pub create_anyway_on_check_failure: bool,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn retry_policy(&self) -> checkmate_core::Result<RetryPolicy> {
        RetryPolicy::from_millis(self.timeout, self.interval, self.consecutive_successes)
    }
}

impl Default for CommandSpec {
    fn default() -> Self {
        Self {
            command: String::new(),
            working_directory: default_working_directory(),
            command_timeout: default_command_timeout(),
            env: BTreeMap::new(),
            create_file: None,
            timeout: default_timeout(),
            interval: default_interval(),
            consecutive_successes: default_consecutive_successes(),
            create_anyway_on_check_failure: false,
        }
    }
}

/// Output of one command run
///
/// A run that timed out keeps the output it wrote before it was killed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the command never ran to completion
    pub exit_code: Option<i32>,
}

/// Outcome of a local command check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandReport {
    pub passed: bool,
    pub result: RetryResult,
    pub attempts: u32,
    /// Output of the last attempt
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    /// Absolute path of the created file, if one was requested
    pub file_path: Option<PathBuf>,
}

/// A validated command check, ready to run
#[derive(Debug)]
pub struct CommandCheck {
    label: String,
    command: String,
    working_directory: PathBuf,
    command_timeout: Duration,
    env: BTreeMap<String, String>,
    create_file: Option<CreateFileSpec>,
    policy: RetryPolicy,
    timeout_ms: u64,
    create_anyway: bool,
}

impl CommandCheck {
    /// Validate `spec`
    ///
    /// Fatal problems are recorded in `diagnostics` as errors and returned.
    pub fn prepare(spec: &CommandSpec, diagnostics: &mut Diagnostics) -> Result<Self> {
        Self::build(spec).map_err(|e| record_fatal(e, diagnostics))
    }

    fn build(spec: &CommandSpec) -> Result<Self> {
        if spec.command.trim().is_empty() {
            return Err(CheckError::EmptyField { field: "command" });
        }
        let policy = spec.retry_policy()?;

        let working_directory = if spec.working_directory.as_os_str().is_empty() {
            default_working_directory()
        } else {
            spec.working_directory.clone()
        };

        Ok(Self {
            label: spec.command.clone(),
            command: spec.command.clone(),
            working_directory,
            command_timeout: Duration::from_millis(spec.command_timeout),
            env: spec.env.clone(),
            create_file: spec.create_file.clone(),
            policy,
            timeout_ms: spec.timeout,
            create_anyway: spec.create_anyway_on_check_failure,
        })
    }

    /// Name used in log output, the command line unless set
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Create the requested file, then probe until the policy reaches a
    /// terminal result
    ///
    /// Failing to create the file is fatal and recorded in `diagnostics`.
    pub async fn run(
        &self,
        cancellation: &CancellationToken,
        diagnostics: &mut Diagnostics,
    ) -> Result<CommandReport> {
        let mut env = self.env.clone();
        let file_path = match &self.create_file {
            Some(file) => {
                let path = self
                    .ensure_file(file)
                    .map_err(|e| record_fatal(e, diagnostics))?;
                tracing::debug!(check = %self.label, path = %path.display(), "created file");
                env.insert(FILEPATH_ENV.to_string(), path.to_string_lossy().into_owned());
                Some(path)
            }
            None => None,
        };

        tracing::debug!(
            check = %self.label,
            working_directory = %self.working_directory.display(),
            timeout_ms = self.timeout_ms,
            "command string: sh -c {}",
            self.command
        );

        let mut attempt = CommandAttempt {
            check: self,
            env,
            warnings: Diagnostics::new(),
        };
        let session = RetryWindow::new(self.policy)
            .with_cancellation(cancellation.clone())
            .with_observer(TracingObserver::new(self.label.as_str()))
            .run(&mut attempt)
            .await;

        diagnostics.append(attempt.warnings);
        let passed = conclude(session.result, self.timeout_ms, self.create_anyway, diagnostics);
        let output = session.last_capture.unwrap_or_default();

        Ok(CommandReport {
            passed,
            result: session.result,
            attempts: session.attempts,
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.exit_code,
            file_path,
        })
    }

    /// Write the file with a unique name and return its absolute path
    fn ensure_file(&self, file: &CreateFileSpec) -> Result<PathBuf> {
        let name = Path::new(&file.name);
        let prefix = name
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let directory = if file.use_working_dir {
            let directory = match name.parent() {
                Some(parent) => self.working_directory.join(parent),
                None => self.working_directory.clone(),
            };
            if file.create_directory {
                std::fs::create_dir_all(&directory).map_err(|source| CheckError::CreateDirectory {
                    path: directory.clone(),
                    source,
                })?;
            }
            directory
        } else {
            std::env::temp_dir()
        };

        let create_error = |source| CheckError::CreateFile {
            path: directory.clone(),
            source,
        };

        let mut temp = tempfile::Builder::new()
            .prefix(&prefix)
            .tempfile_in(&directory)
            .map_err(create_error)?;
        temp.write_all(file.contents.as_bytes()).map_err(create_error)?;
        let (_, path) = temp.keep().map_err(|e| create_error(e.error))?;

        std::path::absolute(&path).map_err(|source| CheckError::FilePath { path, source })
    }
}

struct CommandAttempt<'a> {
    check: &'a CommandCheck,
    env: BTreeMap<String, String>,
    warnings: Diagnostics,
}

impl Attempt for CommandAttempt<'_> {
    type Capture = CommandOutput;

    async fn attempt(&mut self, attempt: u32, _consecutive_successes: u32) -> Verdict<CommandOutput> {
        let check = self.check;

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&check.command)
            .current_dir(&check.working_directory)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(check = %check.label, attempt, error = %e, "error starting command");
                self.warnings
                    .add_warning("Error starting command", format!("sh -c {:?}: {}", check.command, e));
                return Verdict::fail(CommandOutput::default());
            }
        };

        // Pipes are drained into these buffers while waiting, so output
        // written before a timeout is still reported
        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let waited = tokio::time::timeout(check.command_timeout, async {
            let (status, (), ()) = tokio::join!(
                child.wait(),
                drain(stdout_pipe.as_mut(), &mut stdout),
                drain(stderr_pipe.as_mut(), &mut stderr),
            );
            status
        })
        .await;

        let status = match waited {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                tracing::warn!(check = %check.label, attempt, error = %e, "error waiting for command");
                self.warnings
                    .add_warning("Command failed", format!("sh -c {:?}: {}", check.command, e));
                None
            }
            Err(_) => {
                tracing::warn!(check = %check.label, attempt, "command timed out");
                self.warnings.add_warning(
                    "Command timed out",
                    format!(
                        "Command did not finish within {} milliseconds",
                        check.command_timeout.as_millis()
                    ),
                );
                if let Err(e) = child.kill().await {
                    tracing::debug!(check = %check.label, attempt, error = %e, "error killing command");
                }
                None
            }
        };

        let captured = CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code: status.and_then(|s| s.code()),
        };
        tracing::trace!(check = %check.label, attempt, exit_code = ?captured.exit_code, "command finished");
        tracing::debug!(check = %check.label, stdout = %captured.stdout, stderr = %captured.stderr, "command output");

        let passed = status.is_some_and(|s| s.success());
        Verdict::new(passed, captured)
    }
}

/// Read `pipe` to the end, keeping whatever arrived if the read is abandoned
async fn drain<R: AsyncRead + Unpin>(pipe: Option<&mut R>, buffer: &mut Vec<u8>) {
    if let Some(pipe) = pipe {
        if let Err(e) = pipe.read_to_end(buffer).await {
            tracing::debug!(error = %e, "error reading command output");
        }
    }
}

/// Validate `spec` and run the check once
///
/// Returns an error only for fatal problems: bad configuration or a file
/// that could not be created.
pub async fn local_command(
    spec: &CommandSpec,
    cancellation: &CancellationToken,
    diagnostics: &mut Diagnostics,
) -> Result<CommandReport> {
    let check = CommandCheck::prepare(spec, diagnostics)?;
    check.run(cancellation, diagnostics).await
}
