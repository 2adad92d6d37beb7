//! Error types for checkmate-probes

use std::path::PathBuf;

use thiserror::Error;

use crate::jsonpath::JsonPathError;
use crate::status::StatusPatternError;

/// Result type alias using checkmate-probes' error type
pub type Result<T> = std::result::Result<T, CheckError>;

/// Fatal problems found before a check makes its first attempt
///
/// Anything that goes wrong during an attempt is transient and only ever
/// becomes a warning diagnostic; these errors stop the check outright.
#[derive(Error, Debug)]
pub enum CheckError {
    /// Retry policy fields are out of range
    #[error(transparent)]
    Policy(#[from] checkmate_core::Error),

    /// A required field was left empty
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("Unable to parse url {url:?}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Invalid HTTP method {method:?}")]
    InvalidMethod { method: String },

    #[error("Invalid header {name:?}: {message}")]
    InvalidHeader { name: String, message: String },

    #[error(transparent)]
    StatusPattern(#[from] StatusPatternError),

    /// A custom CA bundle and disabled verification were both requested
    #[error("You cannot specify both custom CA and insecure TLS. Please use only one of them.")]
    ConflictingTls,

    #[error("Both jsonpath and json_value must be specified")]
    JsonPathPairing,

    #[error(transparent)]
    JsonPath(#[from] JsonPathError),

    #[error("Could not compile regex {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid CA bundle: {message}")]
    CaBundle { message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("Port must be between 1 and 65535, got {port}")]
    InvalidPort { port: u16 },

    #[error("expected_message is required when expect_write_failure is false")]
    MissingExpectedMessage,

    #[error("Error creating directory {path:?}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error creating file in {path:?}: {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Can't determine the absolute path of the file created at {path:?}: {source}")]
    FilePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CheckError {
    /// Create an invalid regex error
    pub fn invalid_regex(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::InvalidRegex {
            pattern: pattern.into(),
            source,
        }
    }

    /// Short headline used as the diagnostic summary
    pub fn summary(&self) -> &'static str {
        match self {
            CheckError::Policy(_) => "Invalid retry policy",
            CheckError::EmptyField { .. } => "Missing value",
            CheckError::InvalidUrl { .. } => "Client Error",
            CheckError::InvalidMethod { .. } => "Invalid method",
            CheckError::InvalidHeader { .. } => "Invalid header",
            CheckError::StatusPattern(_) => "Bad status code pattern",
            CheckError::ConflictingTls => "Conflicting configuration",
            CheckError::JsonPathPairing => "Client Error",
            CheckError::JsonPath(_) => "Invalid JSONPath",
            CheckError::InvalidRegex { .. } => "Invalid regex",
            CheckError::CaBundle { .. } => "Building CA cert pool",
            CheckError::HttpClient(_) => "Client Error",
            CheckError::InvalidPort { .. } => "Invalid port",
            CheckError::MissingExpectedMessage => "Missing expected message",
            CheckError::CreateDirectory { .. } => "Error creating directory",
            CheckError::CreateFile { .. } => "Error creating file",
            CheckError::FilePath { .. } => "Can't get path to file",
        }
    }
}
