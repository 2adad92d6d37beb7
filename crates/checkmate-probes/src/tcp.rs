//! TCP echo checks
//!
//! Each attempt connects, writes `message` followed by a newline and reads
//! back at most 1024 bytes. In the normal mode the reply must contain the
//! expected message. With `expect_write_failure` the check passes only when
//! the read fails.

use std::time::Duration;

use checkmate_core::retry::{Attempt, RetryWindow, TracingObserver, Verdict};
use checkmate_core::{Diagnostics, RetryPolicy, RetryResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::error::{CheckError, Result};
use crate::outcome::{conclude, record_fatal};

/// Largest reply read per attempt
const REPLY_BUFFER_SIZE: usize = 1024;

fn default_connection_timeout() -> u64 {
    5000
}

fn default_single_attempt_timeout() -> u64 {
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

/// Configuration for a TCP echo check
///
/// Durations are in milliseconds. Empty strings mean "not set".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpEchoSpec {
    pub host: String,
    pub port: u16,

    /// Sent with a trailing newline on every attempt
    #[serde(default)]
    pub message: String,

    /// Text the reply must contain
    #[serde(default)]
    pub expected_message: String,

    /// Pass only if reading the reply fails
    #[serde(default)]
    pub expect_write_failure: bool,

    /// Regex whose first match must be identical across attempts
    #[serde(default)]
    pub persistent_response_regex: String,

    /// 0 leaves connecting bounded only by `timeout`
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,

    /// Timeout for reading the reply; 0 leaves reading bounded only by
    /// `timeout`
    #[serde(default = "default_single_attempt_timeout")]
    pub single_attempt_timeout: u64,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_interval")]
    pub interval: u64,

    #[serde(default = "default_consecutive_successes")]
    pub consecutive_successes: u32,

    #[serde(default)]
    pub create_anyway_on_check_failure: bool,
}

impl TcpEchoSpec {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        message: impl Into<String>,
        expected_message: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            message: message.into(),
            expected_message: expected_message.into(),
            ..Self::default()
        }
    }

    pub fn retry_policy(&self) -> checkmate_core::Result<RetryPolicy> {
        RetryPolicy::from_millis(self.timeout, self.interval, self.consecutive_successes)
    }
}

impl Default for TcpEchoSpec {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 0,
            message: String::new(),
            expected_message: String::new(),
            expect_write_failure: false,
            persistent_response_regex: String::new(),
            connection_timeout: default_connection_timeout(),
            single_attempt_timeout: default_single_attempt_timeout(),
            timeout: default_timeout(),
            interval: default_interval(),
            consecutive_successes: default_consecutive_successes(),
            create_anyway_on_check_failure: false,
        }
    }
}

/// Outcome of a TCP echo check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TcpEchoReport {
    pub passed: bool,
    pub result: RetryResult,
    pub attempts: u32,
    /// Reply read by the last attempt, if it read one
    pub last_reply: Option<String>,
}

/// A validated TCP echo check, ready to run
#[derive(Debug)]
pub struct TcpEchoCheck {
    label: String,
    target: String,
    payload: Vec<u8>,
    expected_message: String,
    expect_write_failure: bool,
    persistent_regex: Option<Regex>,
    connection_timeout: Duration,
    read_timeout: Duration,
    policy: RetryPolicy,
    timeout_ms: u64,
    create_anyway: bool,
}

impl TcpEchoCheck {
    /// Validate `spec`
    ///
    /// Fatal problems are recorded in `diagnostics` as errors and returned.
    /// An expected message in expect-write-failure mode is only a warning.
    pub fn prepare(spec: &TcpEchoSpec, diagnostics: &mut Diagnostics) -> Result<Self> {
        if spec.expect_write_failure && !spec.expected_message.is_empty() {
            tracing::warn!(host = %spec.host, port = spec.port, "expected_message is ignored when expect_write_failure is true");
            diagnostics.add_warning(
                "Ignored configuration",
                "expected_message is ignored when expect_write_failure is true",
            );
        }
        Self::build(spec).map_err(|e| record_fatal(e, diagnostics))
    }

    fn build(spec: &TcpEchoSpec) -> Result<Self> {
        if spec.host.is_empty() {
            return Err(CheckError::EmptyField { field: "host" });
        }
        if spec.port == 0 {
            return Err(CheckError::InvalidPort { port: spec.port });
        }

        let persistent_regex = if spec.persistent_response_regex.is_empty() {
            None
        } else {
            Some(
                Regex::new(&spec.persistent_response_regex)
                    .map_err(|e| CheckError::invalid_regex(&spec.persistent_response_regex, e))?,
            )
        };

        if !spec.expect_write_failure && spec.expected_message.is_empty() {
            return Err(CheckError::MissingExpectedMessage);
        }

        let policy = spec.retry_policy()?;
        let target = format!("{}:{}", spec.host, spec.port);

        Ok(Self {
            label: target.clone(),
            target,
            payload: format!("{}\n", spec.message).into_bytes(),
            expected_message: spec.expected_message.clone(),
            expect_write_failure: spec.expect_write_failure,
            persistent_regex,
            connection_timeout: attempt_limit(spec.connection_timeout),
            read_timeout: attempt_limit(spec.single_attempt_timeout),
            policy,
            timeout_ms: spec.timeout,
            create_anyway: spec.create_anyway_on_check_failure,
        })
    }

    /// Name used in log output, `host:port` unless set
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Probe until the policy reaches a terminal result
    pub async fn run(&self, cancellation: &CancellationToken, diagnostics: &mut Diagnostics) -> TcpEchoReport {
        tracing::debug!(
            check = %self.label,
            target = %self.target,
            expect_write_failure = self.expect_write_failure,
            timeout_ms = self.timeout_ms,
            "starting TCP echo check"
        );

        let mut attempt = TcpEchoAttempt {
            check: self,
            reference: None,
            warnings: Diagnostics::new(),
        };
        let session = RetryWindow::new(self.policy)
            .with_cancellation(cancellation.clone())
            .with_observer(TracingObserver::new(self.label.as_str()))
            .run(&mut attempt)
            .await;

        diagnostics.append(attempt.warnings);
        let passed = conclude(session.result, self.timeout_ms, self.create_anyway, diagnostics);

        TcpEchoReport {
            passed,
            result: session.result,
            attempts: session.attempts,
            last_reply: session.last_capture.flatten(),
        }
    }
}

/// Per-step limit in milliseconds, where 0 leaves only the session deadline
fn attempt_limit(millis: u64) -> Duration {
    if millis == 0 {
        Duration::MAX
    } else {
        Duration::from_millis(millis)
    }
}

/// What one round-trip produced
enum Exchange {
    /// Connecting or writing failed
    Unreachable,
    /// Reading failed, timed out or hit end of stream
    ReadFailed(String),
    /// Reply with trailing NUL bytes removed
    Reply(String),
}

struct TcpEchoAttempt<'a> {
    check: &'a TcpEchoCheck,
    /// First persistent-regex match seen in this session
    reference: Option<String>,
    warnings: Diagnostics,
}

impl TcpEchoAttempt<'_> {
    /// One connect, write and read round-trip; the stream is dropped on return
    async fn exchange(&mut self, attempt: u32) -> Exchange {
        let check = self.check;

        let mut stream = match tokio::time::timeout(
            check.connection_timeout,
            TcpStream::connect(check.target.as_str()),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::warn!(check = %check.label, attempt, error = %e, "dial {} failed", check.target);
                self.warnings.add_warning(
                    "Connection failure",
                    format!("Could not connect to {}: {}", check.target, e),
                );
                return Exchange::Unreachable;
            }
            Err(_) => {
                tracing::warn!(check = %check.label, attempt, "dial {} timed out", check.target);
                self.warnings.add_warning(
                    "Connection failure",
                    format!(
                        "Could not connect to {} within {} milliseconds",
                        check.target,
                        check.connection_timeout.as_millis()
                    ),
                );
                return Exchange::Unreachable;
            }
        };

        if let Err(e) = stream.write_all(&check.payload).await {
            tracing::warn!(check = %check.label, attempt, error = %e, "write to server failed");
            self.warnings
                .add_warning("Write failure", format!("Write to {} failed: {}", check.target, e));
            return Exchange::Unreachable;
        }

        let mut buffer = [0u8; REPLY_BUFFER_SIZE];
        match tokio::time::timeout(check.read_timeout, stream.read(&mut buffer)).await {
            Ok(Ok(0)) => Exchange::ReadFailed("connection closed before a reply was received".to_string()),
            Ok(Ok(n)) => {
                let end = buffer[..n]
                    .iter()
                    .rposition(|&b| b != 0)
                    .map_or(0, |i| i + 1);
                Exchange::Reply(String::from_utf8_lossy(&buffer[..end]).into_owned())
            }
            Ok(Err(e)) => Exchange::ReadFailed(e.to_string()),
            Err(_) => Exchange::ReadFailed(format!(
                "no reply within {} milliseconds",
                check.read_timeout.as_millis()
            )),
        }
    }
}

impl Attempt for TcpEchoAttempt<'_> {
    type Capture = Option<String>;

    async fn attempt(&mut self, attempt: u32, _consecutive_successes: u32) -> Verdict<Option<String>> {
        let exchange = self.exchange(attempt).await;
        let check = self.check;

        if check.expect_write_failure {
            return match exchange {
                Exchange::Unreachable => Verdict::fail(None),
                Exchange::ReadFailed(reason) => {
                    tracing::trace!(check = %check.label, attempt, reason = %reason, "read failed as expected");
                    Verdict::pass(None)
                }
                Exchange::Reply(reply) => {
                    tracing::debug!(check = %check.label, attempt, reply = ?reply, "got a reply while expecting failure");
                    Verdict::fail(Some(reply))
                }
            };
        }

        let reply = match exchange {
            Exchange::Unreachable => return Verdict::fail(None),
            Exchange::Reply(reply) => reply,
            Exchange::ReadFailed(reason) => {
                tracing::warn!(check = %check.label, attempt, reason = %reason, "read from server failed");
                self.warnings.add_warning(
                    "Read failure",
                    format!("Read from {} failed: {}", check.target, reason),
                );
                return Verdict::fail(None);
            }
        };

        if let Some(regex) = &check.persistent_regex {
            let Some(found) = regex.find(&reply) else {
                tracing::warn!(check = %check.label, attempt, reply = ?reply, "reply does not match {}", regex);
                self.warnings.add_warning(
                    "Check failed",
                    format!(
                        "Got response {:?}, which does not match regex {:?}",
                        reply,
                        regex.as_str()
                    ),
                );
                return Verdict::fail(Some(reply));
            };

            match &self.reference {
                None => {
                    tracing::info!(check = %check.label, attempt, value = %found.as_str(), "recorded persistent response");
                    self.reference = Some(found.as_str().to_string());
                    return Verdict::pass(Some(reply));
                }
                Some(reference) if reference != found.as_str() => {
                    tracing::warn!(
                        check = %check.label,
                        attempt,
                        value = %found.as_str(),
                        reference = %reference,
                        "persistent response changed"
                    );
                    self.warnings.add_warning(
                        "Check failed",
                        format!(
                            "Got response {:?}, which does not match previous attempt {:?}",
                            found.as_str(),
                            reference
                        ),
                    );
                    return Verdict::fail(Some(reply));
                }
                Some(_) => {}
            }
        }

        if !reply.contains(&check.expected_message) {
            tracing::warn!(check = %check.label, attempt, reply = ?reply, "reply does not include expected message");
            self.warnings.add_warning(
                "Check failed",
                format!(
                    "Got response {:?}, which does not include expected message {:?}",
                    reply, check.expected_message
                ),
            );
            return Verdict::fail(Some(reply));
        }

        Verdict::pass(Some(reply))
    }
}

/// Validate `spec` and run the check once
///
/// Returns an error only for fatal configuration problems.
pub async fn tcp_echo(
    spec: &TcpEchoSpec,
    cancellation: &CancellationToken,
    diagnostics: &mut Diagnostics,
) -> Result<TcpEchoReport> {
    let check = TcpEchoCheck::prepare(spec, diagnostics)?;
    Ok(check.run(cancellation, diagnostics).await)
}
