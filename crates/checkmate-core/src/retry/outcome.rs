//! Values exchanged between the retry window and the attempts it drives
//!
//! An attempt reports a `Verdict` carrying whatever it captured (a response
//! body, command output). The window turns verdicts into `AttemptOutcome`s
//! for observers and finally into one `Session` per run.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Result of a single attempt, with the output it captured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict<T> {
    /// Whether the attempt satisfied the success predicate
    pub passed: bool,
    /// Output captured by the attempt, kept by the window as the latest
    pub capture: T,
}

impl<T> Verdict<T> {
    pub fn new(passed: bool, capture: T) -> Self {
        Self { passed, capture }
    }

    /// A passing verdict
    pub fn pass(capture: T) -> Self {
        Self::new(true, capture)
    }

    /// A failing verdict
    pub fn fail(capture: T) -> Self {
        Self::new(false, capture)
    }
}

impl Verdict<()> {
    /// A verdict with nothing captured
    pub fn from_bool(passed: bool) -> Self {
        Self::new(passed, ())
    }
}

/// Terminal classification of a probing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryResult {
    /// The required number of consecutive successes was reached
    Success,
    /// The overall deadline fired first
    TimeoutExceeded,
    /// The session was cancelled before reaching a terminal success
    Failure,
}

impl fmt::Display for RetryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryResult::Success => write!(f, "success"),
            RetryResult::TimeoutExceeded => write!(f, "timeout exceeded"),
            RetryResult::Failure => write!(f, "failure"),
        }
    }
}

/// What the window knows after one attempt, handed to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptOutcome {
    /// Whether the attempt passed
    pub succeeded: bool,
    /// 1-indexed attempt number
    pub attempt: u32,
    /// Consecutive successes including this attempt (0 after a failure)
    pub consecutive_successes: u32,
}

/// Record of a whole probing session
#[derive(Debug, Clone)]
pub struct Session<T> {
    /// Terminal classification
    pub result: RetryResult,
    /// Number of attempts that completed
    pub attempts: u32,
    /// Consecutive successes at the moment the session ended
    pub consecutive_successes: u32,
    /// Wall-clock time spent in the session
    pub elapsed: Duration,
    /// Capture of the most recently completed attempt, if any
    pub last_capture: Option<T>,
}

impl<T> Session<T> {
    pub fn is_success(&self) -> bool {
        self.result == RetryResult::Success
    }

    /// Consume the session, keeping only the latest capture
    pub fn into_capture(self) -> Option<T> {
        self.last_capture
    }
}
