//! nightsweep CLI entry point
//!
//! This is a minimal entrypoint that:
//! 1. Parses CLI arguments (via cli::run)
//! 2. Dispatches to CLI commands (via cli::run)
//! 3. Prints errors to stderr
//! 4. Exits with non-zero on failure
//!
//! A maintenance run that terminates exits zero whether it succeeded or
//! failed; the distinction is conveyed by the audit log and the
//! notification. Non-zero exits are reserved for CLI-level failures.

use nightsweep::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
