//! # checkmate-probes
//!
//! Probe drivers for the checkmate retry window:
//! - `http`: status code pattern plus optional JSONPath value check
//! - `tcp`: echo round-trips with expected content or expected failure
//! - `command`: local shell commands with optional file materialisation
//!
//! Each driver validates its spec up front (`prepare`), then runs a session
//! and translates the outcome into a report plus diagnostics.

pub mod command;
pub mod config;
pub mod error;
pub mod http;
pub mod jsonpath;
mod outcome;
pub mod probe;
pub mod status;
pub mod tcp;

pub use command::{local_command, CommandCheck, CommandOutput, CommandReport, CommandSpec, CreateFileSpec};
pub use config::{CheckDefinition, CheckSpec, ChecksFile};
pub use error::{CheckError, Result};
pub use http::{health_check, HttpCheck, HttpCheckSpec, HttpReport};
pub use jsonpath::{JsonPathError, JsonPathTemplate};
pub use probe::{CheckReport, Probe};
pub use status::{check_status_code, StatusPattern, StatusPatternError};
pub use tcp::{tcp_echo, TcpEchoCheck, TcpEchoReport, TcpEchoSpec};
