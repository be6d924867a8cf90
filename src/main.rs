//! mapq: a FIFO queue over a lock-coordinated key-value store.
//!
//! This is the main entry point for the `mapq` CLI. It parses arguments,
//! dispatches to the appropriate command handler, and handles errors with
//! proper exit codes.

use mapq::cli::Cli;
use mapq::commands::{self, Output};
use mapq::{exit_codes, logging};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    logging::init(cli.verbose);

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    let mut out = Output::new(&mut handle);

    match commands::dispatch(cli, &mut out) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            // Return appropriate exit code
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
