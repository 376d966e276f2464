//! segcore CLI entry point
//!
//! This is a minimal entrypoint that:
//! 1. Installs the log subscriber (filter from `SEGCORE_LOG`, else the
//!    configured default)
//! 2. Dispatches to CLI commands (via cli::run)
//! 3. Prints errors to stderr
//! 4. Exits with non-zero on failure

use segcore::cli;
use segcore::config::{SegcoreConfig, ENV_LOG};
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_env(ENV_LOG)
        .unwrap_or_else(|_| EnvFilter::new(SegcoreConfig::default().log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .init();

    if let Err(e) = cli::run() {
        if cli::write_error(e.code_str(), &e.to_string()).is_err() {
            eprintln!("{}", e);
        }
        std::process::exit(1);
    }
}
