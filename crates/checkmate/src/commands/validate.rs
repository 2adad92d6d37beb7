//! Validate command - prepare checks without probing anything

use anyhow::{bail, Context, Result};
use camino::Utf8Path;
use checkmate_core::Diagnostics;
use checkmate_probes::ChecksFile;

use crate::cli::ValidateArgs;
use crate::output;

/// Run the validate command
pub fn run(args: ValidateArgs, config: &Utf8Path) -> Result<()> {
    let file = ChecksFile::load(config)
        .with_context(|| format!("Failed to load checks from {config}"))?;
    let selected = file.select(&args.only)?;

    output::header(&format!("Validating {config}"));

    let mut invalid = 0;
    for definition in &selected {
        let mut diagnostics = Diagnostics::new();
        let title = format!("{} ({})", definition.name, definition.check.kind());

        match definition.prepare(&mut diagnostics) {
            Ok(_) => output::success(&title),
            Err(e) => {
                tracing::debug!(check = %definition.name, error = %e, "check is invalid");
                invalid += 1;
                output::error(&title);
            }
        }
        for diagnostic in diagnostics.iter() {
            output::diagnostic(diagnostic);
        }
    }

    if invalid > 0 {
        bail!("{invalid} of {} check(s) are invalid", selected.len());
    }
    output::success(&format!("{} check(s) are valid", selected.len()));
    Ok(())
}
