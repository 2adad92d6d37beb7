//! Retry window execution
//!
//! The window runs one attempt at a time, counts consecutive successes and
//! races the whole loop against the policy's overall deadline. Whichever
//! finishes first wins; the loser is dropped, which also drops any attempt
//! still in flight.

use std::future::Future;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::observer::{NoOpObserver, RetryObserver};
use super::outcome::{AttemptOutcome, RetryResult, Session, Verdict};
use super::policy::RetryPolicy;

/// One probe attempt driven by a `RetryWindow`
///
/// Attempts take `&mut self` so a driver can keep state across the attempts
/// of a single session. The window has no error channel: an attempt that
/// hits an internal error reports a failing verdict and records its own
/// diagnostic.
pub trait Attempt: Send {
    /// Output captured by each attempt
    type Capture: Send;

    /// Perform a single attempt
    ///
    /// # Arguments
    ///
    /// * `attempt` - The attempt number (1-indexed)
    /// * `consecutive_successes` - Successes in a row before this attempt
    fn attempt(
        &mut self,
        attempt: u32,
        consecutive_successes: u32,
    ) -> impl Future<Output = Verdict<Self::Capture>> + Send;
}

/// An `Attempt` backed by a closure
///
/// Created with [`attempt_fn`].
pub struct FnAttempt<F> {
    f: F,
}

/// Wrap a closure returning a future of `Verdict` as an `Attempt`
///
/// # Example
///
/// ```rust
/// use checkmate_core::retry::{attempt_fn, Verdict};
///
/// let attempt = attempt_fn(|attempt, _successes| async move { Verdict::from_bool(attempt > 2) });
/// ```
pub fn attempt_fn<F, Fut, T>(f: F) -> FnAttempt<F>
where
    F: FnMut(u32, u32) -> Fut + Send,
    Fut: Future<Output = Verdict<T>> + Send,
    T: Send,
{
    FnAttempt { f }
}

impl<F, Fut, T> Attempt for FnAttempt<F>
where
    F: FnMut(u32, u32) -> Fut + Send,
    Fut: Future<Output = Verdict<T>> + Send,
    T: Send,
{
    type Capture = T;

    fn attempt(
        &mut self,
        attempt: u32,
        consecutive_successes: u32,
    ) -> impl Future<Output = Verdict<T>> + Send {
        (self.f)(attempt, consecutive_successes)
    }
}

/// Bounded polling loop for one probing session
///
/// # Example
///
/// ```rust
/// use checkmate_core::retry::{RetryPolicy, RetryWindow, TracingObserver};
/// use tokio_util::sync::CancellationToken;
///
/// let policy = RetryPolicy::from_millis(5000, 200, 2).unwrap();
/// let window = RetryWindow::new(policy)
///     .with_cancellation(CancellationToken::new())
///     .with_observer(TracingObserver::new("api-health"));
/// ```
pub struct RetryWindow<O = NoOpObserver> {
    policy: RetryPolicy,
    cancellation: Option<CancellationToken>,
    observer: O,
}

impl RetryWindow<NoOpObserver> {
    /// Create a window without cancellation or observation
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            cancellation: None,
            observer: NoOpObserver,
        }
    }
}

impl<O> RetryWindow<O> {
    /// Stop the session with `RetryResult::Failure` once this token is
    /// cancelled
    ///
    /// Cancellation is checked before each attempt; an attempt already in
    /// flight is bounded only by its own timeout.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set the observer
    pub fn with_observer<O2>(self, observer: O2) -> RetryWindow<O2> {
        RetryWindow {
            policy: self.policy,
            cancellation: self.cancellation,
            observer,
        }
    }

    /// The policy this window enforces
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// Counters for one session, readable after the loop is dropped
struct Progress<T> {
    attempts: u32,
    consecutive_successes: u32,
    last_capture: Option<T>,
}

impl<O> RetryWindow<O>
where
    O: RetryObserver,
{
    /// Drive `attempt` until the session reaches a terminal state
    pub async fn run<A>(&self, attempt: &mut A) -> Session<A::Capture>
    where
        A: Attempt,
    {
        let start = Instant::now();
        let mut progress = Progress {
            attempts: 0,
            consecutive_successes: 0,
            last_capture: None,
        };

        let timeout = self.policy.timeout();
        let raced = tokio::time::timeout(timeout, self.drive(attempt, &mut progress, start)).await;

        let result = match raced {
            Ok(result) => result,
            Err(_) => {
                self.observer.on_timeout(progress.attempts, timeout);
                RetryResult::TimeoutExceeded
            }
        };

        Session {
            result,
            attempts: progress.attempts,
            consecutive_successes: progress.consecutive_successes,
            elapsed: start.elapsed(),
            last_capture: progress.last_capture,
        }
    }

    async fn drive<A>(
        &self,
        attempt: &mut A,
        progress: &mut Progress<A::Capture>,
        start: Instant,
    ) -> RetryResult
    where
        A: Attempt,
    {
        let required = self.policy.consecutive_successes();
        let interval = self.policy.interval();

        loop {
            if self.is_cancelled() {
                self.observer.on_cancelled(progress.attempts);
                return RetryResult::Failure;
            }

            let index = progress.attempts + 1;
            self.observer
                .on_attempt_start(index, progress.consecutive_successes, required);

            let verdict = attempt
                .attempt(index, progress.consecutive_successes)
                .await;

            progress.attempts = index;
            progress.last_capture = Some(verdict.capture);

            if verdict.passed {
                progress.consecutive_successes += 1;
                let outcome = AttemptOutcome {
                    succeeded: true,
                    attempt: index,
                    consecutive_successes: progress.consecutive_successes,
                };
                self.observer.on_attempt_passed(&outcome, required);

                if progress.consecutive_successes >= required {
                    self.observer.on_success(index, start.elapsed());
                    return RetryResult::Success;
                }
            } else {
                progress.consecutive_successes = 0;
                let outcome = AttemptOutcome {
                    succeeded: false,
                    attempt: index,
                    consecutive_successes: 0,
                };
                self.observer.on_attempt_failed(&outcome, interval);
            }

            // A zero interval still has to yield, otherwise an attempt that
            // completes synchronously would starve the deadline.
            if interval.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(interval).await;
            }
        }
    }
}
