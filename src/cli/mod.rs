//! CLI module for segcore
//!
//! Provides command-line interface for:
//! - count: Live row count of a segment dump
//! - retrieve: Filtered column materialization
//! - search: Top-k vector search
//! - hybrid-search: Several searches fused by a rank strategy

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, SegmentArgs};
pub use commands::{count, hybrid_search, retrieve, run, run_command, search};
pub use errors::{CliError, CliResult};
pub use io::{write_error, write_response, DeleteEntry, SegmentDump};
