//! Run command - probe every selected check concurrently

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use camino::Utf8Path;
use checkmate_core::Diagnostics;
use checkmate_probes::{CheckDefinition, CheckReport, ChecksFile};
use futures::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::cli::RunArgs;
use crate::output;

/// Result of running one named check
#[derive(Debug, Serialize)]
pub struct CheckOutcome {
    pub name: String,
    pub kind: &'static str,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
    /// Missing when the check could not be prepared
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<CheckReport>,
    pub diagnostics: Diagnostics,
}

fn as_millis<S: serde::Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(elapsed.as_millis() as u64)
}

impl CheckOutcome {
    /// A check is rejected when it recorded any error diagnostic
    ///
    /// A check that never passed but was configured to be tolerated only
    /// carries warnings and is accepted.
    pub fn is_accepted(&self) -> bool {
        self.report.is_some() && !self.diagnostics.has_error()
    }
}

/// Run the run command
pub async fn run(args: RunArgs, config: &Utf8Path) -> Result<()> {
    let file = ChecksFile::load(config)
        .with_context(|| format!("Failed to load checks from {config}"))?;
    let selected = file.select(&args.only)?;

    if selected.is_empty() {
        output::warning(&format!("No checks defined in {config}"));
        return Ok(());
    }

    let cancellation = CancellationToken::new();
    let interrupt = {
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling checks");
                cancellation.cancel();
            }
        })
    };

    if !args.json {
        output::info(&format!("Running {} check(s) from {config}", selected.len()));
    }
    let outcomes = run_checks(&selected, &cancellation).await;
    interrupt.abort();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        print_outcomes(&outcomes);
    }

    let rejected = outcomes.iter().filter(|o| !o.is_accepted()).count();
    if rejected > 0 {
        bail!("{rejected} of {} check(s) failed", outcomes.len());
    }
    Ok(())
}

/// Run `definitions` concurrently, preserving their order in the result
pub async fn run_checks(
    definitions: &[&CheckDefinition],
    cancellation: &CancellationToken,
) -> Vec<CheckOutcome> {
    join_all(
        definitions
            .iter()
            .map(|definition| run_check(definition, cancellation)),
    )
    .await
}

async fn run_check(definition: &CheckDefinition, cancellation: &CancellationToken) -> CheckOutcome {
    let started = Instant::now();
    let mut diagnostics = Diagnostics::new();

    // Fatal errors are already recorded in the diagnostics
    let report = definition.run(cancellation, &mut diagnostics).await.ok();

    let elapsed = started.elapsed();
    tracing::info!(
        check = %definition.name,
        elapsed_ms = elapsed.as_millis() as u64,
        passed = report.as_ref().is_some_and(CheckReport::passed),
        "check finished"
    );

    CheckOutcome {
        name: definition.name.clone(),
        kind: definition.check.kind(),
        elapsed,
        report,
        diagnostics,
    }
}

fn print_outcomes(outcomes: &[CheckOutcome]) {
    output::header("Results");

    for outcome in outcomes {
        let title = format!("{} ({})", outcome.name, outcome.kind);
        match &outcome.report {
            Some(report) if report.passed() => output::success(&format!(
                "{title} passed after {} attempt(s) in {} ms",
                report.attempts(),
                outcome.elapsed.as_millis()
            )),
            Some(report) if outcome.is_accepted() => output::warning(&format!(
                "{title} did not pass ({}) after {} attempt(s), continuing anyway",
                report.result(),
                report.attempts()
            )),
            Some(report) => output::error(&format!(
                "{title} failed ({}) after {} attempt(s)",
                report.result(),
                report.attempts()
            )),
            None => output::error(&format!("{title} could not be prepared")),
        }

        if let Some(report) = &outcome.report {
            print_report_details(report);
        }
        for diagnostic in outcome.diagnostics.iter() {
            output::diagnostic(diagnostic);
        }
    }
}

fn print_report_details(report: &CheckReport) {
    match report {
        CheckReport::Http(r) if !r.result_body.is_empty() => output::kv("value", &r.result_body),
        CheckReport::TcpEcho(r) => {
            if let Some(reply) = &r.last_reply {
                output::kv("reply", reply);
            }
        }
        CheckReport::LocalCommand(r) => {
            if let Some(code) = r.exit_code {
                output::kv("exit code", &code.to_string());
            }
            if let Some(path) = &r.file_path {
                output::kv("file", &path.display().to_string());
            }
            if !r.stdout.trim().is_empty() {
                output::kv("stdout", r.stdout.trim_end());
            }
        }
        _ => {}
    }
}
