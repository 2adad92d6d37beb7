//! Terminal output utilities

use checkmate_core::{Diagnostic, Severity};
use console::style;

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Print a warning message
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("⚠").yellow().bold(), msg);
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Print a header
pub fn header(msg: &str) {
    println!("\n{}", style(msg).bold().underlined());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}

/// Print a diagnostic indented below its check
pub fn diagnostic(diagnostic: &Diagnostic) {
    let marker = match diagnostic.severity {
        Severity::Warning => style("warning").yellow(),
        Severity::Error => style("error").red(),
    };
    eprintln!(
        "    {} {}: {}",
        marker,
        style(&diagnostic.summary).bold(),
        diagnostic.detail
    );
}
