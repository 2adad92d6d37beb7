//! Integration tests for local command checks
//!
//! Commands run through `sh`, so these tests assume a Unix shell.

use std::time::{Duration, Instant};

use checkmate_core::{Diagnostics, RetryResult};
use checkmate_probes::{local_command, CommandSpec, CreateFileSpec};
use tokio_util::sync::CancellationToken;

fn spec(command: &str) -> CommandSpec {
    let mut spec = CommandSpec::new(command);
    spec.interval = 10;
    spec.timeout = 2000;
    spec
}

#[tokio::test]
async fn test_true_passes() {
    let mut diagnostics = Diagnostics::new();
    let report = local_command(&spec("true"), &CancellationToken::new(), &mut diagnostics)
        .await
        .unwrap();

    assert!(report.passed);
    assert_eq!(report.exit_code, Some(0));
    assert!(diagnostics.is_empty());
}

#[tokio::test]
async fn test_false_without_create_anyway_is_error() {
    let mut spec = spec("false");
    spec.timeout = 200;

    let mut diagnostics = Diagnostics::new();
    let report = local_command(&spec, &CancellationToken::new(), &mut diagnostics)
        .await
        .unwrap();

    assert!(!report.passed);
    assert_eq!(report.result, RetryResult::TimeoutExceeded);
    assert_eq!(report.exit_code, Some(1));
    assert!(diagnostics.errors().any(|d| d.summary == "Check failed"));
}

#[tokio::test]
async fn test_false_with_create_anyway_is_warning() {
    let mut spec = spec("false");
    spec.timeout = 200;
    spec.create_anyway_on_check_failure = true;

    let mut diagnostics = Diagnostics::new();
    let report = local_command(&spec, &CancellationToken::new(), &mut diagnostics)
        .await
        .unwrap();

    assert!(!report.passed);
    assert!(!diagnostics.has_error());
    assert!(diagnostics.warnings().any(|d| d.summary == "Timeout exceeded"));
}

#[tokio::test]
async fn test_captures_stdout_and_stderr() {
    let mut diagnostics = Diagnostics::new();
    let report = local_command(
        &spec("echo out; echo err >&2"),
        &CancellationToken::new(),
        &mut diagnostics,
    )
    .await
    .unwrap();

    assert!(report.passed);
    assert_eq!(report.stdout, "out\n");
    assert_eq!(report.stderr, "err\n");
}

#[tokio::test]
async fn test_env_and_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mut spec = spec("printf '%s' \"$GREETING\" && pwd");
    spec.env.insert("GREETING".into(), "hi ".into());
    spec.working_directory = dir.path().to_path_buf();

    let mut diagnostics = Diagnostics::new();
    let report = local_command(&spec, &CancellationToken::new(), &mut diagnostics)
        .await
        .unwrap();

    assert!(report.passed);
    assert!(report.stdout.starts_with("hi "));
    let canonical = dir.path().canonicalize().unwrap();
    let printed = std::path::PathBuf::from(report.stdout["hi ".len()..].trim_end());
    assert_eq!(printed.canonicalize().unwrap(), canonical);
}

#[tokio::test]
async fn test_create_file_exposed_through_env() {
    let dir = tempfile::tempdir().unwrap();
    let mut spec = spec("cat \"$CHECKMATE_FILEPATH\"");
    spec.working_directory = dir.path().to_path_buf();
    spec.create_file = Some(CreateFileSpec {
        contents: "file contents".into(),
        name: "conf/app.conf".into(),
        use_working_dir: true,
        create_directory: true,
    });

    let mut diagnostics = Diagnostics::new();
    let report = local_command(&spec, &CancellationToken::new(), &mut diagnostics)
        .await
        .unwrap();

    assert!(report.passed);
    assert_eq!(report.stdout, "file contents");
    let path = report.file_path.unwrap();
    assert!(path.is_absolute());
    assert!(path.starts_with(dir.path().join("conf")));
}

#[tokio::test]
async fn test_create_file_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut spec = spec("true");
    spec.working_directory = dir.path().to_path_buf();
    spec.create_file = Some(CreateFileSpec {
        contents: String::new(),
        name: "missing/app.conf".into(),
        use_working_dir: true,
        create_directory: false,
    });

    let mut diagnostics = Diagnostics::new();
    let result = local_command(&spec, &CancellationToken::new(), &mut diagnostics).await;

    assert!(result.is_err());
    assert!(diagnostics
        .errors()
        .any(|d| d.summary == "Error creating file"));
}

#[tokio::test]
async fn test_command_timeout_kills_slow_command() {
    let mut spec = spec("sleep 5");
    spec.command_timeout = 100;
    spec.timeout = 500;

    let started = Instant::now();
    let mut diagnostics = Diagnostics::new();
    let report = local_command(&spec, &CancellationToken::new(), &mut diagnostics)
        .await
        .unwrap();

    assert!(!report.passed);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(diagnostics
        .warnings()
        .any(|d| d.summary == "Command timed out"));
}

#[tokio::test]
async fn test_timed_out_command_keeps_partial_output() {
    let mut spec = spec("echo partial; echo oops >&2; sleep 5");
    spec.command_timeout = 300;
    spec.timeout = 1000;

    let mut diagnostics = Diagnostics::new();
    let report = local_command(&spec, &CancellationToken::new(), &mut diagnostics)
        .await
        .unwrap();

    assert!(!report.passed);
    assert_eq!(report.result, RetryResult::TimeoutExceeded);
    assert_eq!(report.stdout, "partial\n");
    assert_eq!(report.stderr, "oops\n");
    assert_eq!(report.exit_code, None);
}

#[tokio::test]
async fn test_last_attempt_output_reported() {
    let dir = tempfile::tempdir().unwrap();
    let counter = dir.path().join("count");
    // Fails twice, then passes, printing the attempt number each time
    let command = format!(
        "n=$(cat {0} 2>/dev/null || echo 0); n=$((n+1)); echo $n > {0}; echo $n; [ $n -ge 3 ]",
        counter.display()
    );

    let mut diagnostics = Diagnostics::new();
    let report = local_command(&spec(&command), &CancellationToken::new(), &mut diagnostics)
        .await
        .unwrap();

    assert!(report.passed);
    assert_eq!(report.attempts, 3);
    assert_eq!(report.stdout, "3\n");
}
