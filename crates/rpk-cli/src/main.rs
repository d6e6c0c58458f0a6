//! # rpk: Rulepack Bundle CLI
//!
//! Offline tooling for rulepack authors. See the library docs for the
//! subcommands and exit codes.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rpk_cli::checksum::{run_checksum, ChecksumArgs};
use rpk_cli::diff::{run_diff, DiffArgs};
use rpk_cli::suggest::{run_suggest, SuggestArgs};
use rpk_cli::validate::{run_validate, ValidateArgs};

/// Exit code for operational errors.
const EXIT_OPERATIONAL: u8 = 2;

/// Rulepack bundle tooling.
#[derive(Parser, Debug)]
#[command(name = "rpk", version, about = "Rulepack bundle tooling")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check bundles the way a registry install would.
    Validate(ValidateArgs),
    /// Print the rule-data checksum of bundles.
    Checksum(ChecksumArgs),
    /// Suggest the next version.
    Suggest(SuggestArgs),
    /// Structural diff of two bundles' rule data.
    Diff(DiffArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Validate(args) => run_validate(args),
        Commands::Checksum(args) => run_checksum(args),
        Commands::Suggest(args) => run_suggest(args),
        Commands::Diff(args) => run_diff(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(EXIT_OPERATIONAL)
        }
    }
}
