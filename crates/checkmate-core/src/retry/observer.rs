//! Retry observation and logging
//!
//! This module provides the `RetryObserver` trait for monitoring attempts
//! and a `TracingObserver` implementation that logs using the `tracing` crate.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use super::outcome::AttemptOutcome;

/// Observer trait for retry window events
///
/// Implement this trait to receive callbacks while a session runs.
/// This is useful for logging, metrics collection, or debugging.
///
/// # Example
///
/// ```rust
/// use checkmate_core::retry::{AttemptOutcome, RetryObserver};
/// use std::time::Duration;
///
/// struct MetricsObserver;
///
/// impl RetryObserver for MetricsObserver {
///     fn on_attempt_start(&self, attempt: u32, consecutive_successes: u32, required: u32) {}
///
///     fn on_attempt_passed(&self, outcome: &AttemptOutcome, required: u32) {}
///
///     fn on_attempt_failed(&self, outcome: &AttemptOutcome, delay: Duration) {}
///
///     fn on_success(&self, attempts: u32, total_duration: Duration) {}
///
///     fn on_timeout(&self, attempts: u32, timeout: Duration) {}
/// }
/// ```
pub trait RetryObserver: Send + Sync {
    /// Called when an attempt is about to start
    ///
    /// # Arguments
    ///
    /// * `attempt` - The attempt number (1-indexed)
    /// * `consecutive_successes` - Successes in a row before this attempt
    /// * `required` - Successes in a row required to finish
    fn on_attempt_start(&self, attempt: u32, consecutive_successes: u32, required: u32);

    /// Called when an attempt passes but more successes are still needed,
    /// and also for the final passing attempt right before `on_success`
    fn on_attempt_passed(&self, outcome: &AttemptOutcome, required: u32);

    /// Called when an attempt fails and the counter was reset
    ///
    /// # Arguments
    ///
    /// * `outcome` - The failed attempt
    /// * `delay` - The pause before the next attempt
    fn on_attempt_failed(&self, outcome: &AttemptOutcome, delay: Duration);

    /// Called when the required number of consecutive successes is reached
    fn on_success(&self, attempts: u32, total_duration: Duration);

    /// Called when the overall deadline fires before success
    fn on_timeout(&self, attempts: u32, timeout: Duration);

    /// Called when cancellation is observed at the top of an iteration
    fn on_cancelled(&self, attempts: u32) {
        // Default implementation does nothing
        let _ = attempts;
    }
}

/// A no-op observer that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt_start(&self, _attempt: u32, _consecutive_successes: u32, _required: u32) {}

    fn on_attempt_passed(&self, _outcome: &AttemptOutcome, _required: u32) {}

    fn on_attempt_failed(&self, _outcome: &AttemptOutcome, _delay: Duration) {}

    fn on_success(&self, _attempts: u32, _total_duration: Duration) {}

    fn on_timeout(&self, _attempts: u32, _timeout: Duration) {}
}

/// An observer that logs retry window events using the `tracing` crate
///
/// # Log Levels
///
/// - `on_attempt_start`: TRACE
/// - `on_attempt_passed`: TRACE
/// - `on_attempt_failed`: DEBUG
/// - `on_success`: INFO (if > 1 attempt) or DEBUG (first attempt)
/// - `on_timeout`: WARN
/// - `on_cancelled`: WARN
#[derive(Debug, Clone)]
pub struct TracingObserver {
    /// Name of the check being probed (for log context)
    check: String,
}

impl TracingObserver {
    /// Create a new tracing observer
    ///
    /// # Arguments
    ///
    /// * `check` - A descriptive name for the check being probed
    pub fn new(check: impl Into<String>) -> Self {
        Self {
            check: check.into(),
        }
    }

    /// Get the check name
    pub fn check(&self) -> &str {
        &self.check
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("check")
    }
}

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, attempt: u32, consecutive_successes: u32, required: u32) {
        if consecutive_successes > 0 {
            tracing::trace!(
                check = %self.check,
                attempt = attempt,
                "SUCCESS [{}/{}]",
                consecutive_successes,
                required
            );
        } else {
            tracing::trace!(check = %self.check, attempt = attempt, "ATTEMPT #{}", attempt);
        }
    }

    fn on_attempt_passed(&self, outcome: &AttemptOutcome, required: u32) {
        tracing::trace!(
            check = %self.check,
            attempt = outcome.attempt,
            consecutive_successes = outcome.consecutive_successes,
            required = required,
            "attempt passed"
        );
    }

    fn on_attempt_failed(&self, outcome: &AttemptOutcome, delay: Duration) {
        tracing::debug!(
            check = %self.check,
            attempt = outcome.attempt,
            delay_ms = delay.as_millis() as u64,
            "attempt failed, counter reset"
        );
    }

    fn on_success(&self, attempts: u32, total_duration: Duration) {
        if attempts > 1 {
            tracing::info!(
                check = %self.check,
                attempts = attempts,
                total_duration_ms = total_duration.as_millis() as u64,
                "check passed"
            );
        } else {
            tracing::debug!(
                check = %self.check,
                duration_ms = total_duration.as_millis() as u64,
                "check passed on first attempt"
            );
        }
    }

    fn on_timeout(&self, attempts: u32, timeout: Duration) {
        tracing::warn!(
            check = %self.check,
            attempts = attempts,
            timeout_ms = timeout.as_millis() as u64,
            "timeout exceeded before the check passed"
        );
    }

    fn on_cancelled(&self, attempts: u32) {
        tracing::warn!(check = %self.check, attempts = attempts, "check cancelled");
    }
}

/// An observer that collects statistics about attempts
///
/// Useful for testing and metrics collection.
#[derive(Debug, Default)]
pub struct StatsObserver {
    /// Attempt start events
    pub attempt_starts: AtomicU32,
    /// Passed attempt events
    pub passes: AtomicU32,
    /// Failed attempt events
    pub failures: AtomicU32,
    /// Session success events
    pub successes: AtomicU32,
    /// Timeout events
    pub timeouts: AtomicU32,
    /// Cancellation events
    pub cancellations: AtomicU32,
}

impl StatsObserver {
    /// Create a new stats observer
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempt_starts(&self) -> u32 {
        self.attempt_starts.load(Ordering::SeqCst)
    }

    pub fn passes(&self) -> u32 {
        self.passes.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn timeouts(&self) -> u32 {
        self.timeouts.load(Ordering::SeqCst)
    }

    pub fn cancellations(&self) -> u32 {
        self.cancellations.load(Ordering::SeqCst)
    }
}

impl RetryObserver for StatsObserver {
    fn on_attempt_start(&self, _attempt: u32, _consecutive_successes: u32, _required: u32) {
        self.attempt_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_attempt_passed(&self, _outcome: &AttemptOutcome, _required: u32) {
        self.passes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_attempt_failed(&self, _outcome: &AttemptOutcome, _delay: Duration) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn on_success(&self, _attempts: u32, _total_duration: Duration) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_timeout(&self, _attempts: u32, _timeout: Duration) {
        self.timeouts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_cancelled(&self, _attempts: u32) {
        self.cancellations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Implement RetryObserver for Arc<T> where T: RetryObserver
impl<T: RetryObserver + ?Sized> RetryObserver for std::sync::Arc<T> {
    fn on_attempt_start(&self, attempt: u32, consecutive_successes: u32, required: u32) {
        (**self).on_attempt_start(attempt, consecutive_successes, required)
    }

    fn on_attempt_passed(&self, outcome: &AttemptOutcome, required: u32) {
        (**self).on_attempt_passed(outcome, required)
    }

    fn on_attempt_failed(&self, outcome: &AttemptOutcome, delay: Duration) {
        (**self).on_attempt_failed(outcome, delay)
    }

    fn on_success(&self, attempts: u32, total_duration: Duration) {
        (**self).on_success(attempts, total_duration)
    }

    fn on_timeout(&self, attempts: u32, timeout: Duration) {
        (**self).on_timeout(attempts, timeout)
    }

    fn on_cancelled(&self, attempts: u32) {
        (**self).on_cancelled(attempts)
    }
}

/// Implement RetryObserver for Box<T> where T: RetryObserver
impl<T: RetryObserver + ?Sized> RetryObserver for Box<T> {
    fn on_attempt_start(&self, attempt: u32, consecutive_successes: u32, required: u32) {
        (**self).on_attempt_start(attempt, consecutive_successes, required)
    }

    fn on_attempt_passed(&self, outcome: &AttemptOutcome, required: u32) {
        (**self).on_attempt_passed(outcome, required)
    }

    fn on_attempt_failed(&self, outcome: &AttemptOutcome, delay: Duration) {
        (**self).on_attempt_failed(outcome, delay)
    }

    fn on_success(&self, attempts: u32, total_duration: Duration) {
        (**self).on_success(attempts, total_duration)
    }

    fn on_timeout(&self, attempts: u32, timeout: Duration) {
        (**self).on_timeout(attempts, timeout)
    }

    fn on_cancelled(&self, attempts: u32) {
        (**self).on_cancelled(attempts)
    }
}
