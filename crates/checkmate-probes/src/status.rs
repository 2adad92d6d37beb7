//! HTTP status code patterns
//!
//! A pattern is a comma-separated list of single codes (`200`) and inclusive
//! ranges (`200-204`). Ranges may overlap. Whitespace around numbers is
//! ignored.

use std::fmt;
use std::num::ParseIntError;
use std::ops::RangeInclusive;
use std::str::FromStr;

use thiserror::Error;

/// Status code pattern parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusPatternError {
    #[error("Can't convert {value:?} to integer: {source}")]
    InvalidBound {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("Left bound {left} is greater than right bound {right}")]
    Inverted { left: i64, right: i64 },

    #[error("Too many dashes in range pattern {segment:?}")]
    TooManyDashes { segment: String },
}

/// Parsed status code pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPattern {
    source: String,
    ranges: Vec<RangeInclusive<i64>>,
}

impl StatusPattern {
    /// Parse a pattern such as `"200-204,300"`
    pub fn parse(pattern: &str) -> Result<Self, StatusPatternError> {
        let ranges = pattern
            .split(',')
            .map(parse_segment)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: pattern.to_string(),
            ranges,
        })
    }

    /// Whether `code` equals a singleton or falls within a range
    pub fn matches(&self, code: u16) -> bool {
        let code = i64::from(code);
        self.ranges.iter().any(|range| range.contains(&code))
    }

    /// The pattern text as written
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for StatusPattern {
    type Err = StatusPatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for StatusPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parse `pattern` and test `code` against it in one go
pub fn check_status_code(pattern: &str, code: u16) -> Result<bool, StatusPatternError> {
    Ok(StatusPattern::parse(pattern)?.matches(code))
}

fn parse_segment(segment: &str) -> Result<RangeInclusive<i64>, StatusPatternError> {
    let bounds: Vec<&str> = segment.split('-').collect();
    match bounds.as_slice() {
        [single] => {
            let value = parse_bound(single)?;
            Ok(value..=value)
        }
        [left, right] => {
            let left = parse_bound(left)?;
            let right = parse_bound(right)?;
            if left > right {
                return Err(StatusPatternError::Inverted { left, right });
            }
            Ok(left..=right)
        }
        _ => Err(StatusPatternError::TooManyDashes {
            segment: segment.to_string(),
        }),
    }
}

fn parse_bound(value: &str) -> Result<i64, StatusPatternError> {
    let trimmed = value.trim();
    trimmed
        .parse()
        .map_err(|source| StatusPatternError::InvalidBound {
            value: trimmed.to_string(),
            source,
        })
}
