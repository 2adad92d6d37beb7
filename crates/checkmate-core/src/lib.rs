//! # checkmate-core
//!
//! Core library for checkmate providing:
//! - The retry window engine that drives probe attempts until enough
//!   consecutive successes are observed or the overall timeout elapses
//! - Retry policy types with validation
//! - The diagnostics collector that probes report warnings and errors into

pub mod diagnostics;
pub mod error;
pub mod retry;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{Error, Result};
pub use retry::{RetryPolicy, RetryResult, RetryWindow, Session, Verdict};
