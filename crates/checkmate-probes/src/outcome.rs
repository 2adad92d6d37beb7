//! Translation of retry results into pass flags and diagnostics

use checkmate_core::{Diagnostics, RetryResult};

use crate::error::CheckError;

/// Record a fatal error as an error diagnostic and hand it back
pub(crate) fn record_fatal(error: CheckError, diagnostics: &mut Diagnostics) -> CheckError {
    tracing::error!(error = %error, "{}", error.summary());
    diagnostics.add_error(error.summary(), error.to_string());
    error
}

/// Turn a terminal session result into the check's pass flag
///
/// A timeout is always reported as a warning; it becomes an error too
/// unless the caller tolerates failed checks.
pub(crate) fn conclude(
    result: RetryResult,
    timeout_ms: u64,
    create_anyway_on_check_failure: bool,
    diagnostics: &mut Diagnostics,
) -> bool {
    match result {
        RetryResult::Success => true,
        RetryResult::TimeoutExceeded => {
            diagnostics.add_warning(
                "Timeout exceeded",
                format!("Timeout of {timeout_ms} milliseconds exceeded"),
            );
            if !create_anyway_on_check_failure {
                diagnostics.add_error(
                    "Check failed",
                    "The check did not pass within the timeout and create_anyway_on_check_failure is false",
                );
            }
            false
        }
        RetryResult::Failure => {
            diagnostics.add_error("Check cancelled", "The check was cancelled before it passed");
            false
        }
    }
}
