//! Retry window engine
//!
//! Drives a probe attempt on a fixed interval until a required number of
//! consecutive successes is observed or the overall timeout elapses.
//!
//! # Features
//!
//! - Consecutive-success counting: any failed attempt resets the count
//! - Mandatory wall-clock bound on every session
//! - Cooperative cancellation via `CancellationToken`
//! - Observable attempts via the `RetryObserver` trait
//! - Built-in `TracingObserver` for logging
//! - Attempts return their captured output instead of mutating shared state
//!
//! # Example
//!
//! ```rust,no_run
//! use checkmate_core::retry::{attempt_fn, RetryPolicy, RetryResult, RetryWindow, Verdict};
//! use std::time::Duration;
//!
//! async fn example() -> checkmate_core::Result<()> {
//!     let policy = RetryPolicy::new(Duration::from_secs(5), Duration::from_millis(200), 2)?;
//!
//!     let mut attempt = attempt_fn(|_attempt, _successes| async { Verdict::from_bool(true) });
//!     let session = RetryWindow::new(policy).run(&mut attempt).await;
//!
//!     assert_eq!(session.result, RetryResult::Success);
//!     Ok(())
//! }
//! ```

mod observer;
mod outcome;
mod policy;
mod window;

pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use outcome::{AttemptOutcome, RetryResult, Session, Verdict};
pub use policy::RetryPolicy;
pub use window::{attempt_fn, Attempt, FnAttempt, RetryWindow};
