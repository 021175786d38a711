//! tree2avro CLI entry point
//!
//! Delegates everything to `cli::run`, prints errors to stderr and exits
//! with status 1 on failure.

use tree2avro::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
