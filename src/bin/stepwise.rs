//! Stepwise CLI
//!
//! Runs, checks, and inspects step plans from the command line. Logs go to
//! stderr; results go to stdout.

use stepwise_core::cli;

fn main() {
    match cli::run_cli() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
