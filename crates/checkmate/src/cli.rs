//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// checkmate - wait until services report healthy
#[derive(Parser, Debug)]
#[command(name = "checkmate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the checks file
    #[arg(
        short,
        long,
        global = true,
        env = "CHECKMATE_CONFIG",
        default_value = "checkmate.yaml"
    )]
    pub config: Utf8PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run checks until each passes or its timeout elapses
    Run(RunArgs),

    /// Validate checks without running them
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Only run the named check (repeatable)
    #[arg(long = "only", value_name = "NAME")]
    pub only: Vec<String>,

    /// Print reports as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Only validate the named check (repeatable)
    #[arg(long = "only", value_name = "NAME")]
    pub only: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["checkmate", "run"]).unwrap();
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
        assert_eq!(cli.config, "checkmate.yaml");

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.only.is_empty());
        assert!(!args.json);
    }

    #[test]
    fn test_run_with_selection() {
        let cli = Cli::try_parse_from([
            "checkmate",
            "-vv",
            "run",
            "--only",
            "api",
            "--only",
            "db",
            "--json",
            "--config",
            "ci/checks.yaml",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, "ci/checks.yaml");

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.only, vec!["api", "db"]);
        assert!(args.json);
    }

    #[test]
    fn test_validate() {
        let cli = Cli::try_parse_from(["checkmate", "validate", "-q", "--only", "api"]).unwrap();
        assert!(cli.quiet);
        let Commands::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(args.only, vec!["api"]);
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["checkmate"]).is_err());
    }
}
