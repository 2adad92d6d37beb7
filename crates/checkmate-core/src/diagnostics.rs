//! Diagnostics collected while preparing and running checks
//!
//! Probes never log-and-forget a problem the host should see. Recoverable
//! per-attempt problems become warnings, configuration problems and
//! rejected outcomes become errors. The host decides what to do with them.

use std::fmt;

use serde::Serialize;

/// Severity of a single diagnostic entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Recoverable problem, the check kept going
    Warning,
    /// The check was aborted or its outcome rejected
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single diagnostic with a short summary and a detailed message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
}

impl Diagnostic {
    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.summary, self.detail)
    }
}

/// Ordered collection of diagnostics
///
/// Identical entries are only recorded once, so a probe that fails the same
/// way on every attempt produces a single warning rather than one per
/// attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic unless an identical one is already present
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if !self.entries.contains(&diagnostic) {
            self.entries.push(diagnostic);
        }
    }

    /// Record an error
    pub fn add_error(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.push(Diagnostic::error(summary, detail));
    }

    /// Record a warning
    pub fn add_warning(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.push(Diagnostic::warning(summary, detail));
    }

    /// Append every entry of another collection
    pub fn append(&mut self, other: Diagnostics) {
        for diagnostic in other.entries {
            self.push(diagnostic);
        }
    }

    /// True when at least one error was recorded
    pub fn has_error(&self) -> bool {
        self.entries.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        for diagnostic in iter {
            self.push(diagnostic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_collection_has_no_error() {
        let diagnostics = Diagnostics::new();
        assert!(diagnostics.is_empty());
        assert!(!diagnostics.has_error());
    }

    #[test]
    fn test_warning_is_not_an_error() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.add_warning("Timeout exceeded", "Timeout of 1000 milliseconds exceeded");

        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics.has_error());
        assert_eq!(diagnostics.warnings().count(), 1);
    }

    #[test]
    fn test_error_is_detected() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.add_warning("Timeout exceeded", "Timeout of 1000 milliseconds exceeded");
        diagnostics.add_error("Check failed", "did not pass");

        assert!(diagnostics.has_error());
        assert_eq!(diagnostics.errors().count(), 1);
        assert_eq!(diagnostics.warnings().count(), 1);
    }

    #[test]
    fn test_duplicates_are_collapsed() {
        let mut diagnostics = Diagnostics::new();
        for _ in 0..5 {
            diagnostics.add_warning("Check failed", "Got response \"x\"");
        }
        diagnostics.add_warning("Check failed", "Got response \"y\"");

        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn test_append_preserves_order() {
        let mut first = Diagnostics::new();
        first.add_warning("a", "1");
        let mut second = Diagnostics::new();
        second.add_error("b", "2");
        second.add_warning("a", "1");

        first.append(second);

        let summaries: Vec<_> = first.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(summaries, vec!["a", "b"]);
    }

    #[test]
    fn test_display() {
        let diagnostic = Diagnostic::error("Invalid regex", "unclosed group");
        assert_eq!(diagnostic.to_string(), "error: Invalid regex: unclosed group");
    }

    #[test]
    fn test_serializes_as_list() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.add_warning("Timeout exceeded", "late");
        let json = serde_json::to_value(&diagnostics).unwrap();
        assert_eq!(json[0]["severity"], "warning");
        assert_eq!(json[0]["summary"], "Timeout exceeded");
    }
}
